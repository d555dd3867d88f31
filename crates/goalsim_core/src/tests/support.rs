//! Shared fixtures for the integration tests.

use jiff::civil::Date;

use crate::config::EngineConfig;
use crate::engine::{AnalysisOptions, Engine};
use crate::model::goal::{Allocation, Flexibility, Goal, GoalBuilder};
use crate::model::profile::{Profile, RiskTolerance};

pub fn analysis_date() -> Date {
    jiff::civil::date(2025, 1, 1)
}

/// Engine with auto-save off so tests never touch the filesystem.
pub fn test_engine() -> Engine {
    let mut config = EngineConfig::default();
    config.cache.save_interval_seconds = 0;
    Engine::new(config)
}

pub fn test_profile() -> Profile {
    Profile {
        age: 35,
        annual_income: 2_400_000.0,
        monthly_expenses: 80_000.0,
        dependents: 1,
        risk_tolerance: RiskTolerance::Moderate,
        country: "IN".to_string(),
    }
}

/// Fixed-seed options; N and the seed match the regression scenarios.
pub fn seeded_options(trial_count: usize) -> AnalysisOptions {
    AnalysisOptions {
        trial_count: Some(trial_count),
        root_seed: Some(42),
        analysis_date: Some(analysis_date()),
        ..AnalysisOptions::default()
    }
}

/// The 60/30/5/0/5 growth mix used throughout the scenarios.
pub fn growth_allocation() -> Allocation {
    Allocation::new(0.6, 0.3, 0.05, 0.0, 0.05)
}

/// The baseline stretch goal: 1M initial, 50k monthly, 50M target over 17
/// years in the growth mix.
pub fn stretch_goal() -> Goal {
    GoalBuilder::new("wealth-17y", analysis_date())
        .target(50_000_000.0)
        .current(1_000_000.0)
        .monthly(50_000.0)
        .years(17)
        .flexibility(Flexibility::SomewhatFlexible)
        .allocation(growth_allocation())
        .build()
        .unwrap()
}
