//! Simulation driver: deterministic chunked execution of all trials.
//!
//! A single root seed is split into per-trial sub-seeds by an index-based
//! SplitMix64 derivation, so trial k's randomness depends only on
//! `(root_seed, k)`. Chunks execute in parallel with no shared mutable
//! state and are reassembled in trial-index order, making the output
//! byte-identical across runs and worker counts.

use std::time::Instant;

use tracing::debug;

use crate::config::SimConfig;
use crate::error::{EngineError, Result};
use crate::kernel::ProjectionKernel;
use crate::model::inputs::{SimulationInputs, TrialSet};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Trials per worker chunk.
const CHUNK_SIZE: usize = 100;

/// Tolerated share of degenerate trials before the run fails.
const MAX_DEGENERATE_SHARE: f64 = 0.01;

/// Derive trial `index`'s sub-seed from the root seed (SplitMix64 over the
/// index stream). Independent of chunking and worker count.
#[must_use]
pub fn trial_seed(root_seed: u64, index: u64) -> u64 {
    let mut z = root_seed
        .wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Run every trial described by `inputs`, enforcing the configured trial
/// bounds and an optional deadline (checked cooperatively at chunk
/// boundaries; on expiry partial results are discarded).
pub fn run_trials(
    inputs: &SimulationInputs,
    limits: &SimConfig,
    deadline: Option<Instant>,
) -> Result<TrialSet> {
    if inputs.trial_count < limits.min_trials {
        return Err(EngineError::InsufficientTrials {
            requested: inputs.trial_count,
            minimum: limits.min_trials,
        });
    }
    if inputs.trial_count > limits.max_trials {
        return Err(EngineError::TrialCountExceedsLimit {
            requested: inputs.trial_count,
            maximum: limits.max_trials,
        });
    }

    let kernel = ProjectionKernel::new(inputs)?;
    let total = inputs.trial_count;
    let num_chunks = total.div_ceil(CHUNK_SIZE);
    debug!(trials = total, chunks = num_chunks, "running simulation");

    let run_chunk = |chunk_idx: usize| -> Option<Vec<crate::kernel::TrialOutcome>> {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return None;
            }
        }
        let start = chunk_idx * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(total);
        Some(
            (start..end)
                .map(|k| kernel.run_trial(trial_seed(inputs.root_seed, k as u64)))
                .collect(),
        )
    };

    #[cfg(feature = "parallel")]
    let chunks: Vec<Option<Vec<crate::kernel::TrialOutcome>>> =
        (0..num_chunks).into_par_iter().map(run_chunk).collect();

    #[cfg(not(feature = "parallel"))]
    let chunks: Vec<Option<Vec<crate::kernel::TrialOutcome>>> =
        (0..num_chunks).map(run_chunk).collect();

    // A single missing chunk means the deadline fired; everything computed
    // so far is discarded.
    let mut terminal_values = Vec::with_capacity(total);
    let mut trajectories = inputs.include_trajectories.then(|| Vec::with_capacity(total));
    let mut degenerate = 0usize;
    for chunk in chunks {
        let Some(outcomes) = chunk else {
            return Err(EngineError::DeadlineExceeded);
        };
        for outcome in outcomes {
            if outcome.is_degenerate() {
                degenerate += 1;
            }
            terminal_values.push(outcome.terminal_value);
            if let Some(trajectories) = trajectories.as_mut() {
                // Kernel always emits a trajectory when inputs request one
                trajectories.push(outcome.trajectory.unwrap_or_default());
            }
        }
    }

    if degenerate as f64 > total as f64 * MAX_DEGENERATE_SHARE {
        return Err(EngineError::DegenerateTrialRate {
            degenerate,
            total,
        });
    }

    Ok(TrialSet {
        terminal_values,
        trajectories,
        degenerate_trials: degenerate,
    })
}
