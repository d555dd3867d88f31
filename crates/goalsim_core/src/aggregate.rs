//! Probability aggregation: from a trial array to a typed result.
//!
//! The canonical `success_probability` is ramp-calibrated: trials landing
//! in [0.9·T, T) earn partial credit on a linear ramp. Binary counting is
//! flat near the boundary, which hides the small improvements the
//! recommender needs to detect; the ramp keeps the probability surface
//! smooth. The raw binary fraction is reported alongside.
//!
//! Every aggregate filters degenerate (non-finite) sentinel trials first;
//! no emitted field is ever NaN or infinite.

use std::collections::BTreeMap;

use crate::assumptions::MarketAssumptions;
use crate::error::Result;
use crate::model::goal::{Goal, GoalCategory};
use crate::model::inputs::TrialSet;
use crate::model::profile::Profile;
use crate::model::result::{
    DistributionMetrics, GoalSpecificMetrics, Histogram, PercentileBands, ProbabilityResult,
    RiskMetrics, SuccessMetrics, TimeMetrics,
};

/// Width of the partial-credit band below the target, as a fraction of the
/// target. Must stay within [0.01, 0.20].
pub const RAMP_BAND: f64 = 0.10;

/// Ending below this fraction of target counts as shortfall.
const SHORTFALL_THRESHOLD: f64 = 0.8;
/// Ending above this fraction of target counts as upside.
const UPSIDE_THRESHOLD: f64 = 1.2;

const HISTOGRAM_BINS: usize = 20;

/// Assumed years of retirement spending behind the replacement ratio.
const RETIREMENT_SPENDING_YEARS: f64 = 25.0;
/// A home-purchase target is treated as this share of the property value.
const DOWN_PAYMENT_FRACTION: f64 = 0.20;

/// Partial credit for a terminal value against a target: 1 at or above the
/// target, a linear ramp through [0.9·T, T), 0 below.
#[must_use]
pub fn ramp_credit(value: f64, target: f64) -> f64 {
    if !value.is_finite() || target <= 0.0 {
        return 0.0;
    }
    if value >= target {
        1.0
    } else {
        let floor = target * (1.0 - RAMP_BAND);
        if value >= floor {
            1.0 - (target - value) / (target * RAMP_BAND)
        } else {
            0.0
        }
    }
}

/// Linear-interpolation percentile over a sorted slice (standard order-
/// statistic definition). `pct` is in [0, 100].
#[must_use]
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Aggregate a trial set into the full probability result for a goal.
pub fn aggregate_result(
    trials: &TrialSet,
    goal: &Goal,
    profile: &Profile,
    assumptions: &MarketAssumptions,
    years: u32,
) -> Result<ProbabilityResult> {
    let target = goal.target_amount;
    let total = trials.trial_count();

    let mut finite: Vec<f64> = trials
        .terminal_values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = finite.len();

    let success = success_metrics(&finite, target, total, trials.degenerate_trials);
    let distribution = distribution_metrics(&finite);
    let risk = risk_metrics(&finite, target);
    let time = time_metrics(trials, target, years);
    let goal_specific = goal_specific_metrics(
        goal,
        profile,
        assumptions,
        distribution.percentiles.p50,
        years,
    );

    debug_assert!(n <= total);
    Ok(ProbabilityResult {
        success,
        time,
        distribution,
        risk,
        goal_specific,
    })
}

fn success_metrics(
    finite: &[f64],
    target: f64,
    total: usize,
    degenerate: usize,
) -> SuccessMetrics {
    let n = finite.len();
    if n == 0 {
        return SuccessMetrics {
            success_probability: 0.0,
            raw_success_probability: 0.0,
            confidence_interval: (0.0, 0.0),
            trial_count: total,
            convergence_rate: 0.0,
        };
    }

    let calibrated =
        finite.iter().map(|v| ramp_credit(*v, target)).sum::<f64>() / n as f64;
    let raw = finite.iter().filter(|v| **v >= target).count() as f64 / n as f64;

    let half_width = 1.96 * (calibrated * (1.0 - calibrated) / n as f64).sqrt();
    let convergence_rate = if total > 0 {
        (total - degenerate) as f64 / total as f64
    } else {
        0.0
    };

    SuccessMetrics {
        success_probability: calibrated.clamp(0.0, 1.0),
        raw_success_probability: raw,
        confidence_interval: (
            (calibrated - half_width).clamp(0.0, 1.0),
            (calibrated + half_width).clamp(0.0, 1.0),
        ),
        trial_count: total,
        convergence_rate,
    }
}

fn distribution_metrics(finite: &[f64]) -> DistributionMetrics {
    let n = finite.len();
    if n == 0 {
        return DistributionMetrics {
            percentiles: PercentileBands {
                p10: 0.0,
                p25: 0.0,
                p50: 0.0,
                p75: 0.0,
                p90: 0.0,
            },
            histogram: Histogram {
                edges: vec![0.0, 0.0],
                counts: vec![0],
            },
            mean: 0.0,
            std_dev: 0.0,
        };
    }

    let mean = finite.iter().sum::<f64>() / n as f64;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    DistributionMetrics {
        percentiles: PercentileBands {
            p10: percentile(finite, 10.0),
            p25: percentile(finite, 25.0),
            p50: percentile(finite, 50.0),
            p75: percentile(finite, 75.0),
            p90: percentile(finite, 90.0),
        },
        histogram: histogram(finite),
        mean,
        std_dev: variance.sqrt(),
    }
}

fn histogram(sorted: &[f64]) -> Histogram {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let span = max - min;
    if span <= 0.0 {
        // Zero-variance distribution collapses to a single bin
        return Histogram {
            edges: vec![min, min],
            counts: vec![sorted.len()],
        };
    }

    let width = span / HISTOGRAM_BINS as f64;
    let edges: Vec<f64> = (0..=HISTOGRAM_BINS).map(|i| min + width * i as f64).collect();
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for v in sorted {
        let bin = (((v - min) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    Histogram { edges, counts }
}

fn risk_metrics(finite: &[f64], target: f64) -> RiskMetrics {
    let n = finite.len();
    if n == 0 {
        return RiskMetrics {
            shortfall_risk: 0.0,
            downside_magnitude: 0.0,
            upside_potential: 0.0,
        };
    }

    let shortfall = finite
        .iter()
        .filter(|v| **v < target * SHORTFALL_THRESHOLD)
        .count() as f64
        / n as f64;
    let upside = finite
        .iter()
        .filter(|v| **v >= target * UPSIDE_THRESHOLD)
        .count() as f64
        / n as f64;

    let failing: Vec<f64> = finite.iter().copied().filter(|v| *v < target).collect();
    let downside = if failing.is_empty() {
        0.0
    } else {
        failing.iter().map(|v| (target - v) / target).sum::<f64>() / failing.len() as f64
    };

    RiskMetrics {
        shortfall_risk: shortfall,
        downside_magnitude: downside,
        upside_potential: upside,
    }
}

/// Cumulative hit probability per year, ramp-calibrated at each year in
/// value space. A trial's credit is its running maximum over the years, so
/// the curve is non-decreasing even though portfolio values can fall.
fn time_metrics(trials: &TrialSet, target: f64, years: u32) -> TimeMetrics {
    let Some(trajectories) = trials.trajectories.as_ref() else {
        return TimeMetrics::default();
    };

    let usable: Vec<&Vec<f64>> = trajectories
        .iter()
        .zip(&trials.terminal_values)
        .filter(|(_, terminal)| terminal.is_finite())
        .map(|(t, _)| t)
        .collect();
    let n = usable.len();
    if n == 0 {
        return TimeMetrics::default();
    }

    let horizon = years as usize;
    let mut cumulative_credit = vec![0.0f64; horizon + 1];
    let mut hit_years: Vec<u32> = Vec::new();

    for trajectory in &usable {
        let mut best = 0.0f64;
        let mut hit: Option<u32> = None;
        for year in 0..=horizon {
            let value = trajectory.get(year).copied().unwrap_or(f64::NAN);
            let credit = ramp_credit(value, target);
            best = best.max(credit);
            cumulative_credit[year] += best;
            if hit.is_none() && value.is_finite() && value >= target {
                hit = Some(year as u32);
            }
        }
        if let Some(year) = hit {
            hit_years.push(year);
        }
    }

    let probability_over_time: BTreeMap<u32, f64> = cumulative_credit
        .iter()
        .enumerate()
        .map(|(year, credit)| (year as u32, (credit / n as f64).clamp(0.0, 1.0)))
        .collect();

    // Median time-to-target is only meaningful when at least half the
    // trials ever reach the target
    let median_years_to_target = if hit_years.len() * 2 >= n {
        hit_years.sort_unstable();
        let sorted: Vec<f64> = hit_years.iter().map(|y| f64::from(*y)).collect();
        Some(percentile(&sorted, 50.0))
    } else {
        None
    };

    TimeMetrics {
        median_years_to_target,
        probability_over_time,
    }
}

/// Category add-ons are best-effort: a missing profile field leaves the
/// metric absent with a note instead of failing the result.
fn goal_specific_metrics(
    goal: &Goal,
    profile: &Profile,
    assumptions: &MarketAssumptions,
    median_terminal: f64,
    years: u32,
) -> GoalSpecificMetrics {
    let mut metrics = GoalSpecificMetrics::default();
    match goal.category {
        GoalCategory::Retirement => {
            let annual_expenses = profile.monthly_expenses * 12.0;
            let need = annual_expenses * RETIREMENT_SPENDING_YEARS;
            if need > 0.0 && need.is_finite() {
                metrics.replacement_ratio = Some(median_terminal / need);
            } else {
                metrics.note =
                    Some("replacement ratio unavailable: profile has no expenses".to_string());
            }
        }
        GoalCategory::Education => {
            let inflation = assumptions.inflation_for(GoalCategory::Education);
            let adjusted = goal.target_amount * (1.0 + inflation).powi(years as i32);
            if adjusted.is_finite() {
                metrics.inflation_adjusted_target = Some(adjusted);
            } else {
                metrics.note = Some("inflation-adjusted need overflowed".to_string());
            }
        }
        GoalCategory::HomePurchase => {
            let property_value = goal.target_amount / DOWN_PAYMENT_FRACTION;
            metrics.down_payment_share = Some(median_terminal / property_value);
        }
        _ => {}
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::goal::{Allocation, Flexibility, GoalCategory, Importance};
    use crate::model::profile::RiskTolerance;

    fn goal(category: GoalCategory, target: f64) -> Goal {
        Goal {
            id: "g1".to_string(),
            category,
            target_amount: target,
            current_amount: 0.0,
            monthly_contribution: 0.0,
            target_date: jiff::civil::date(2040, 1, 1),
            importance: Importance::High,
            flexibility: Flexibility::SomewhatFlexible,
            allocation: Allocation::all_cash(),
        }
    }

    fn profile() -> Profile {
        Profile {
            age: 35,
            annual_income: 2_400_000.0,
            monthly_expenses: 80_000.0,
            dependents: 1,
            risk_tolerance: RiskTolerance::Moderate,
            country: "IN".to_string(),
        }
    }

    fn trial_set(values: Vec<f64>) -> TrialSet {
        let degenerate = values.iter().filter(|v| !v.is_finite()).count();
        TrialSet {
            terminal_values: values,
            trajectories: None,
            degenerate_trials: degenerate,
        }
    }

    #[test]
    fn test_ramp_credit_shape() {
        assert_eq!(ramp_credit(100.0, 100.0), 1.0);
        assert_eq!(ramp_credit(150.0, 100.0), 1.0);
        assert_eq!(ramp_credit(89.9, 100.0), 0.0);
        assert!((ramp_credit(95.0, 100.0) - 0.5).abs() < 1e-12);
        assert!((ramp_credit(90.0, 100.0) - 0.0).abs() < 1e-12);
        assert_eq!(ramp_credit(f64::NAN, 100.0), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&sorted, 100.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&sorted, 25.0) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_calibrated_exceeds_raw_near_boundary() {
        // Half the trials just below target: raw sees 0.5, calibrated more
        let trials = trial_set(vec![98.0, 98.0, 120.0, 120.0]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            10,
        )
        .unwrap();
        assert!((result.success.raw_success_probability - 0.5).abs() < 1e-12);
        assert!(result.success.success_probability > 0.5);
        assert!(result.success.success_probability < 1.0);
    }

    #[test]
    fn test_degenerate_sentinels_are_filtered() {
        let trials = trial_set(vec![150.0, f64::NAN, 150.0, f64::INFINITY]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            10,
        )
        .unwrap();
        assert_eq!(result.success.success_probability, 1.0);
        assert!((result.success.convergence_rate - 0.5).abs() < 1e-12);
        assert!(result.distribution.mean.is_finite());
        assert!(result.distribution.std_dev.is_finite());
    }

    #[test]
    fn test_zero_variance_histogram_is_finite() {
        let trials = trial_set(vec![100.0; 50]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            5,
        )
        .unwrap();
        assert_eq!(result.distribution.histogram.counts, vec![50]);
        assert_eq!(result.success.success_probability, 1.0);
        assert_eq!(result.distribution.std_dev, 0.0);
    }

    #[test]
    fn test_risk_metrics_thresholds() {
        // target 100: one deep shortfall, one mild miss, one success, one upside
        let trials = trial_set(vec![50.0, 95.0, 105.0, 130.0]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            10,
        )
        .unwrap();
        assert!((result.risk.shortfall_risk - 0.25).abs() < 1e-12);
        assert!((result.risk.upside_potential - 0.25).abs() < 1e-12);
        // Failures are 50 and 95: mean of (0.5, 0.05)
        assert!((result.risk.downside_magnitude - 0.275).abs() < 1e-12);
    }

    #[test]
    fn test_no_failures_means_zero_downside() {
        let trials = trial_set(vec![150.0, 200.0]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            10,
        )
        .unwrap();
        assert_eq!(result.risk.downside_magnitude, 0.0);
        assert_eq!(result.risk.shortfall_risk, 0.0);
    }

    #[test]
    fn test_time_metrics_from_trajectories() {
        // Trial A hits in year 2, trial B never hits
        let trials = TrialSet {
            terminal_values: vec![120.0, 80.0],
            trajectories: Some(vec![
                vec![50.0, 90.0, 110.0, 120.0],
                vec![50.0, 60.0, 70.0, 80.0],
            ]),
            degenerate_trials: 0,
        };
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            3,
        )
        .unwrap();

        let curve = &result.time.probability_over_time;
        assert_eq!(curve.len(), 4);
        // Monotone non-decreasing
        let values: Vec<f64> = curve.values().copied().collect();
        for pair in values.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
        }
        // Exactly half the trials hit, so the median hit year is defined
        assert_eq!(result.time.median_years_to_target, Some(2.0));
    }

    #[test]
    fn test_median_absent_when_most_trials_never_hit() {
        let trials = TrialSet {
            terminal_values: vec![80.0, 70.0, 120.0],
            trajectories: Some(vec![
                vec![50.0, 80.0],
                vec![50.0, 70.0],
                vec![50.0, 120.0],
            ]),
            degenerate_trials: 0,
        };
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Custom, 100.0),
            &profile(),
            &MarketAssumptions::default(),
            1,
        )
        .unwrap();
        assert_eq!(result.time.median_years_to_target, None);
    }

    #[test]
    fn test_retirement_replacement_ratio() {
        let trials = trial_set(vec![24_000_000.0; 10]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Retirement, 20_000_000.0),
            &profile(),
            &MarketAssumptions::default(),
            20,
        )
        .unwrap();
        // Need = 80k * 12 * 25 = 24M; median 24M => ratio 1.0
        assert!((result.goal_specific.replacement_ratio.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_retirement_metric_degrades_without_expenses() {
        let mut p = profile();
        p.monthly_expenses = 0.0;
        let trials = trial_set(vec![1_000_000.0; 10]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Retirement, 2_000_000.0),
            &p,
            &MarketAssumptions::default(),
            20,
        )
        .unwrap();
        assert!(result.goal_specific.replacement_ratio.is_none());
        assert!(result.goal_specific.note.is_some());
        // Base metrics unaffected
        assert!(result.success.success_probability.is_finite());
    }

    #[test]
    fn test_education_inflation_adjusted_target() {
        let trials = trial_set(vec![1_000_000.0; 10]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::Education, 1_000_000.0),
            &profile(),
            &MarketAssumptions::default(),
            10,
        )
        .unwrap();
        let expected = 1_000_000.0 * 1.08_f64.powi(10);
        assert!((result.goal_specific.inflation_adjusted_target.unwrap() - expected).abs() < 1.0);
    }

    #[test]
    fn test_home_purchase_down_payment_share() {
        let trials = trial_set(vec![1_500_000.0; 10]);
        let result = aggregate_result(
            &trials,
            &goal(GoalCategory::HomePurchase, 2_000_000.0),
            &profile(),
            &MarketAssumptions::default(),
            5,
        )
        .unwrap();
        // Property value 10M; median 1.5M => 15%
        assert!((result.goal_specific.down_payment_share.unwrap() - 0.15).abs() < 1e-12);
    }
}
