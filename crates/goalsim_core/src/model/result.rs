//! Typed analysis results.
//!
//! The result is struct-per-sub-map rather than nested string-keyed maps,
//! so `success_probability` is a plain field and serialization has exactly
//! one path (serde). [`ProbabilityResult::safe_success_probability`] is the
//! tolerant accessor: it coerces non-finite values to 0.0 and clips to
//! [0, 1], for callers that cannot afford to trust upstream data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::goal::AssetClass;

/// Probability-of-success metrics for the analyzed goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessMetrics {
    /// Ramp-calibrated success probability in [0, 1]. The canonical value.
    pub success_probability: f64,
    /// Plain fraction of trials with terminal value >= target.
    pub raw_success_probability: f64,
    /// Normal-approximation 95% interval for the estimate, clipped to [0, 1].
    pub confidence_interval: (f64, f64),
    pub trial_count: usize,
    /// Share of trials that completed without degenerating.
    pub convergence_rate: f64,
}

/// Time-based metrics; populated only when trajectories were simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimeMetrics {
    /// Median years until the running value first reaches the target.
    /// `None` when fewer than half the trials ever reach it.
    pub median_years_to_target: Option<f64>,
    /// Year -> cumulative (ramp-calibrated) probability of having reached
    /// the target by that year. Non-decreasing in the year.
    pub probability_over_time: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges, length = number of bins + 1.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetrics {
    pub percentiles: PercentileBands,
    pub histogram: Histogram,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Probability of ending below 80% of target.
    pub shortfall_risk: f64,
    /// Mean relative shortfall `(T - v) / T` over failing trials.
    pub downside_magnitude: f64,
    /// Probability of exceeding 120% of target.
    pub upside_potential: f64,
}

/// Category-dependent additions. Each field is best-effort: a failure to
/// compute one leaves it absent with a note, never a failed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GoalSpecificMetrics {
    /// Retirement: median terminal value relative to the assumed lifetime
    /// spending need.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_ratio: Option<f64>,
    /// Education: target grown by education inflation over the horizon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inflation_adjusted_target: Option<f64>,
    /// Home purchase: median terminal value as a share of the assumed
    /// property value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment_share: Option<f64>,
    /// Why a metric above is absent, when one is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The full analysis result for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub success: SuccessMetrics,
    pub time: TimeMetrics,
    pub distribution: DistributionMetrics,
    pub risk: RiskMetrics,
    pub goal_specific: GoalSpecificMetrics,
}

impl ProbabilityResult {
    /// The canonical probability, coerced to a usable value: non-finite
    /// becomes 0.0, then clipped to [0, 1].
    #[must_use]
    pub fn safe_success_probability(&self) -> f64 {
        let p = self.success.success_probability;
        if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
    }

    /// Lossless serialization; `from_json(to_json(r)) == r` structurally.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::error::EngineError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::error::EngineError::Serialization(e.to_string()))
    }
}

/// The closed set of adjustment types the recommender may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ContributionIncrease,
    /// Begin contributing on a goal that currently has no contribution.
    ContributionStart,
    ContributionDecrease,
    TimeframeExtension,
    TimeframeReduction,
    TargetReduction,
    TargetIncrease,
    AllocationShift,
    LumpsumInjection,
    /// Retirement-specific: contributions routed through a tax-advantaged
    /// wrapper.
    TaxAdvantagedContribution,
}

/// Ordered easiest-first; the derived ordering is the ranking tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationImpact {
    /// `new_probability - baseline`, both ramp-calibrated.
    pub probability_increase: f64,
    /// Baseline + increase, clipped to [0, 1].
    pub new_probability: f64,
}

/// A single-parameter goal mutation with its measured probability impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// The mutation magnitude in the kind's natural unit: a multiplier for
    /// contribution increases/decreases, a monthly amount for started or
    /// tax-advantaged contributions, years for timeframe changes, a
    /// fraction for target changes, weight points for allocation shifts,
    /// an amount for lumpsums.
    pub value: f64,
    pub description: String,
    pub impact: RecommendationImpact,
    pub implementation_difficulty: Difficulty,
    /// Change in annual cash outlay; positive costs the user money,
    /// zero for timeframe/target/allocation changes.
    pub budget_impact: f64,
    /// For allocation shifts: which classes the weight moved between.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_move: Option<(AssetClass, AssetClass)>,
}
