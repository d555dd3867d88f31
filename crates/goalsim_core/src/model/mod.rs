//! Core data model: goals, profiles, simulation inputs, results.

pub mod goal;
pub mod inputs;
pub mod profile;
pub mod result;

pub use goal::{
    Allocation, AssetClass, Flexibility, Goal, GoalBuilder, GoalCategory, Importance,
    ALLOCATION_SUM_TOLERANCE,
};
pub use inputs::{AssetParams, SimulationInputs, TrialSet};
pub use profile::{Profile, RiskTolerance};
pub use result::{
    Difficulty, DistributionMetrics, GoalSpecificMetrics, Histogram, PercentileBands,
    ProbabilityResult, Recommendation, RecommendationImpact, RecommendationKind, RiskMetrics,
    SuccessMetrics, TimeMetrics,
};
