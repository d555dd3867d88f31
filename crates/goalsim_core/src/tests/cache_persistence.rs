//! Cache snapshot round-trips and fingerprint injectivity.

use std::collections::HashSet;

use super::support::*;
use crate::model::inputs::SimulationInputs;

#[test]
fn test_snapshot_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mc_cache.bin");
    let goal = stretch_goal();
    let profile = test_profile();
    let options = seeded_options(1000);

    let engine = test_engine();
    let original = engine.analyze(&goal, &profile, &options).unwrap();
    engine.cache().save(Some(&path)).unwrap();

    // Fresh engine, fresh cache: loading the snapshot must give a hit and
    // the identical result
    let restarted = test_engine();
    assert!(restarted.cache().load(Some(&path)) >= 1);
    let restored = restarted.analyze(&goal, &profile, &options).unwrap();

    assert_eq!(restored, original);
    let stats = restarted.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
}

#[test]
fn test_cached_and_recomputed_results_match() {
    let engine = test_engine();
    let goal = stretch_goal();
    let profile = test_profile();
    let options = seeded_options(1000);

    let cached = {
        engine.analyze(&goal, &profile, &options).unwrap(); // populate
        engine.analyze(&goal, &profile, &options).unwrap() // hit
    };

    let mut fresh_options = options.clone();
    fresh_options.force_recalculate = true;
    let recomputed = engine.analyze(&goal, &profile, &fresh_options).unwrap();

    assert_eq!(cached, recomputed);
}

#[test]
fn test_invalidate_forces_recomputation() {
    let engine = test_engine();
    let goal = stretch_goal();
    let profile = test_profile();
    let options = seeded_options(1000);

    engine.analyze(&goal, &profile, &options).unwrap();
    assert_eq!(engine.cache().stats().size, 1);
    assert_eq!(engine.cache().invalidate(None), 1);

    engine.analyze(&goal, &profile, &options).unwrap();
    let stats = engine.cache().stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hits, 0);
}

#[test]
fn test_fingerprints_are_injective_over_input_corpus() {
    // 10,000 distinct inputs spanning amounts, horizons and seeds must not
    // collide
    let mut keys = HashSet::new();
    let mut count = 0usize;
    for amount_step in 0..100u32 {
        for years in 1..=10u32 {
            for seed in 0..10u64 {
                let years_usize = years as usize;
                let inputs = SimulationInputs {
                    initial_amount: 100_000.0 + f64::from(amount_step) * 1_000.0,
                    contributions: vec![120_000.0; years_usize],
                    years,
                    allocations: vec![growth_allocation(); years_usize],
                    asset_params: [
                        (0.10, 0.18),
                        (0.06, 0.05),
                        (0.07, 0.15),
                        (0.08, 0.12),
                        (0.03, 0.01),
                    ],
                    trial_count: 1000,
                    root_seed: seed,
                    include_trajectories: false,
                };
                keys.insert(inputs.fingerprint());
                count += 1;
            }
        }
    }
    assert_eq!(count, 10_000);
    assert_eq!(keys.len(), count, "fingerprint collision in corpus");
}
