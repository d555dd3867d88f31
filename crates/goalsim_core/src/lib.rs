//! Goal probability and adjustment engine
//!
//! This crate estimates the probability that a long-horizon financial goal
//! is met by its target date under stochastic market returns, and searches
//! a bounded space of goal adjustments for the changes that raise that
//! probability the most. It provides:
//! - A per-trial lognormal projection kernel with fixed draw order
//! - A chunked parallel simulation driver with deterministic seeding
//! - A TTL/LRU result cache with atomic snapshot persistence
//! - A ramp-calibrated probability aggregator with risk and time metrics
//! - A template-based adjustment recommender ranked by probability gain
//!
//! # Quick start
//!
//! ```ignore
//! use goalsim_core::{Engine, EngineConfig, AnalysisOptions, GoalBuilder, Allocation};
//!
//! let engine = Engine::new(EngineConfig::default());
//! let goal = GoalBuilder::new("retirement", today)
//!     .target(50_000_000.0)
//!     .current(1_000_000.0)
//!     .monthly(50_000.0)
//!     .years(17)
//!     .allocation(Allocation::new(0.6, 0.3, 0.05, 0.0, 0.05))
//!     .build()?;
//! let result = engine.analyze(&goal, &profile, &AnalysisOptions::default())?;
//! println!("p = {:.2}", result.success.success_probability);
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod aggregate;
pub mod assumptions;
pub mod cache;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod recommend;
pub mod schedule;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use assumptions::{AssumptionOverrides, MarketAssumptions};
pub use cache::{CacheConfigUpdate, CacheStats, ResultCache};
pub use config::{CacheConfig, EngineConfig, SimConfig};
pub use engine::{AnalysisOptions, Engine, RecommendOptions};
pub use error::{EngineError, Result};
pub use model::{
    Allocation, AssetClass, Flexibility, Goal, GoalBuilder, GoalCategory, Importance,
    ProbabilityResult, Profile, Recommendation, RecommendationKind, RiskTolerance,
};
pub use schedule::{AllocationPolicy, ContributionPattern};
