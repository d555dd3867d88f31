//! Adjustment recommender: a bounded search over goal mutations.
//!
//! Each template mutates one parameter, the mutated goal is re-priced
//! through the same simulate + aggregate path (sharing the cache and the
//! root seed), and candidates are ranked by probability gain. This is a
//! search, not an optimizer: listed recommendations are improving and
//! individually applicable, nothing more is claimed.
//!
//! A failing candidate is logged and dropped; only a deadline expiry
//! aborts the sweep.

use jiff::civil::Date;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::engine::{Engine, RecommendOptions};
use crate::model::goal::{AssetClass, Flexibility, Goal, GoalCategory};
use crate::model::profile::Profile;
use crate::model::result::{
    Difficulty, ProbabilityResult, Recommendation, RecommendationImpact, RecommendationKind,
};

const DEFAULT_MIN_DELTA: f64 = 0.005;
const DEFAULT_MAX_RECOMMENDATIONS: usize = 5;

const CONTRIBUTION_MULTIPLIERS: [f64; 4] = [1.1, 1.2, 1.3, 1.5];
/// Additive contribution steps, as a share of monthly income, used when
/// the goal has no contribution for a multiplier to act on.
const CONTRIBUTION_INCOME_SHARES: [f64; 2] = [0.05, 0.10];
const TIMEFRAME_EXTENSIONS_YEARS: [i16; 4] = [1, 2, 3, 5];
const TARGET_REDUCTIONS: [f64; 3] = [0.05, 0.10, 0.20];
const ALLOCATION_SHIFT_POINTS: [f64; 2] = [0.10, 0.20];
const LUMPSUM_INCOME_MONTHS: [f64; 3] = [1.0, 3.0, 6.0];
/// Retirement-specific: extra monthly contribution routed through a
/// tax-advantaged wrapper, as a share of monthly income.
const TAX_ADVANTAGED_INCOME_SHARE: f64 = 0.05;

/// A candidate mutation awaiting pricing.
struct Candidate {
    kind: RecommendationKind,
    value: f64,
    description: String,
    difficulty: Difficulty,
    budget_impact: f64,
    allocation_move: Option<(AssetClass, AssetClass)>,
    goal: Goal,
}

/// Price and rank candidates against the baseline. Called by
/// [`Engine::recommend`], which has already computed the baseline.
pub(crate) fn recommend_adjustments(
    engine: &Engine,
    goal: &Goal,
    profile: &Profile,
    baseline: &ProbabilityResult,
    options: &RecommendOptions,
) -> Result<Vec<Recommendation>> {
    let as_of = options
        .analysis
        .analysis_date
        .unwrap_or_else(|| jiff::Zoned::now().date());
    let baseline_p = baseline.safe_success_probability();
    let min_delta = options.min_delta.unwrap_or(DEFAULT_MIN_DELTA);
    let max_recommendations = options
        .max_recommendations
        .unwrap_or(DEFAULT_MAX_RECOMMENDATIONS);

    let candidates = generate_candidates(goal, profile, as_of);
    debug!(goal = %goal.id, count = candidates.len(), "candidates generated");

    let mut ranked: Vec<Recommendation> = Vec::new();
    for candidate in candidates {
        let result = match engine.analyze_inner(&candidate.goal, profile, &options.analysis) {
            Ok(result) => result,
            Err(EngineError::DeadlineExceeded) => return Err(EngineError::DeadlineExceeded),
            Err(e) => {
                warn!(goal = %goal.id, kind = ?candidate.kind, error = %e, "dropping failed candidate");
                continue;
            }
        };
        let delta = result.safe_success_probability() - baseline_p;
        if delta <= min_delta {
            continue;
        }
        ranked.push(Recommendation {
            kind: candidate.kind,
            value: candidate.value,
            description: candidate.description,
            impact: RecommendationImpact {
                probability_increase: delta,
                new_probability: (baseline_p + delta).clamp(0.0, 1.0),
            },
            implementation_difficulty: candidate.difficulty,
            budget_impact: candidate.budget_impact,
            allocation_move: candidate.allocation_move,
        });
    }

    ranked.sort_by(|a, b| {
        b.impact
            .probability_increase
            .partial_cmp(&a.impact.probability_increase)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.implementation_difficulty.cmp(&b.implementation_difficulty))
            .then(
                a.budget_impact
                    .abs()
                    .partial_cmp(&b.budget_impact.abs())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    ranked.truncate(max_recommendations);
    Ok(ranked)
}

/// Enumerate the closed set of mutation templates applicable to this goal.
/// Every returned candidate's goal has passed validation.
fn generate_candidates(goal: &Goal, profile: &Profile, as_of: Date) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    contribution_candidates(goal, profile, &mut candidates);
    timeframe_candidates(goal, &mut candidates);
    target_candidates(goal, &mut candidates);
    allocation_candidates(goal, profile, &mut candidates);
    lumpsum_candidates(goal, profile, &mut candidates);
    category_candidates(goal, profile, &mut candidates);

    candidates
        .into_iter()
        .filter(|c| c.goal.validate(as_of).is_ok())
        .collect()
}

fn contribution_candidates(goal: &Goal, profile: &Profile, out: &mut Vec<Candidate>) {
    if goal.monthly_contribution > 0.0 {
        for multiplier in CONTRIBUTION_MULTIPLIERS {
            let new_monthly = goal.monthly_contribution * multiplier;
            let increase_share = multiplier - 1.0;
            let mut mutated = goal.clone();
            mutated.monthly_contribution = new_monthly;
            out.push(Candidate {
                kind: RecommendationKind::ContributionIncrease,
                value: multiplier,
                description: format!(
                    "Increase the monthly contribution by {:.0}% to {:.0}",
                    increase_share * 100.0,
                    new_monthly
                ),
                difficulty: if increase_share <= 0.20 {
                    Difficulty::Moderate
                } else {
                    Difficulty::Hard
                },
                budget_impact: (new_monthly - goal.monthly_contribution) * 12.0,
                allocation_move: None,
                goal: mutated,
            });
        }
    } else if profile.monthly_income() > 0.0 {
        // Nothing to multiply; offer additive steps tied to income
        for share in CONTRIBUTION_INCOME_SHARES {
            let new_monthly = profile.monthly_income() * share;
            let mut mutated = goal.clone();
            mutated.monthly_contribution = new_monthly;
            out.push(Candidate {
                kind: RecommendationKind::ContributionStart,
                value: new_monthly,
                description: format!(
                    "Start a monthly contribution of {new_monthly:.0} ({:.0}% of income)",
                    share * 100.0
                ),
                difficulty: Difficulty::Moderate,
                budget_impact: new_monthly * 12.0,
                allocation_move: None,
                goal: mutated,
            });
        }
    }
}

fn timeframe_candidates(goal: &Goal, out: &mut Vec<Candidate>) {
    if goal.flexibility == Flexibility::Fixed {
        return;
    }
    for years in TIMEFRAME_EXTENSIONS_YEARS {
        let mut mutated = goal.clone();
        mutated.target_date = goal
            .target_date
            .saturating_add(jiff::Span::new().years(i64::from(years)));
        out.push(Candidate {
            kind: RecommendationKind::TimeframeExtension,
            value: f64::from(years),
            description: format!("Extend the target date by {years} years"),
            difficulty: Difficulty::Easy,
            budget_impact: 0.0,
            allocation_move: None,
            goal: mutated,
        });
    }
}

fn target_candidates(goal: &Goal, out: &mut Vec<Candidate>) {
    if goal.flexibility != Flexibility::VeryFlexible {
        return;
    }
    for reduction in TARGET_REDUCTIONS {
        let mut mutated = goal.clone();
        mutated.target_amount = goal.target_amount * (1.0 - reduction);
        out.push(Candidate {
            kind: RecommendationKind::TargetReduction,
            value: reduction,
            description: format!(
                "Reduce the target by {:.0}% to {:.0}",
                reduction * 100.0,
                mutated.target_amount
            ),
            difficulty: Difficulty::Hard,
            budget_impact: 0.0,
            allocation_move: None,
            goal: mutated,
        });
    }
}

fn allocation_candidates(goal: &Goal, profile: &Profile, out: &mut Vec<Candidate>) {
    // Adjacent risk tiers only: cash <-> debt <-> equity
    let moves = [
        (AssetClass::Cash, AssetClass::Debt),
        (AssetClass::Debt, AssetClass::Equity),
        (AssetClass::Equity, AssetClass::Debt),
        (AssetClass::Debt, AssetClass::Cash),
    ];
    let ceiling = profile.equity_ceiling();

    for (from, to) in moves {
        for points in ALLOCATION_SHIFT_POINTS {
            let shifted = goal.allocation.shifted(from, to, points);
            if shifted == goal.allocation {
                continue; // donor had nothing to give
            }
            if to == AssetClass::Equity && shifted.equity > ceiling + 1e-9 {
                continue;
            }
            let mut mutated = goal.clone();
            mutated.allocation = shifted;
            out.push(Candidate {
                kind: RecommendationKind::AllocationShift,
                value: points,
                description: format!(
                    "Shift {:.0}% of the portfolio from {} to {}",
                    points * 100.0,
                    from.name(),
                    to.name()
                ),
                difficulty: Difficulty::Easy,
                budget_impact: 0.0,
                allocation_move: Some((from, to)),
                goal: mutated,
            });
        }
    }
}

fn lumpsum_candidates(goal: &Goal, profile: &Profile, out: &mut Vec<Candidate>) {
    let monthly_income = profile.monthly_income();
    if monthly_income <= 0.0 {
        return;
    }
    for months in LUMPSUM_INCOME_MONTHS {
        let amount = monthly_income * months;
        let mut mutated = goal.clone();
        mutated.current_amount = goal.current_amount + amount;
        out.push(Candidate {
            kind: RecommendationKind::LumpsumInjection,
            value: amount,
            description: format!(
                "Add a one-time amount of {amount:.0} ({months:.0} months of income)"
            ),
            difficulty: if months <= 3.0 {
                Difficulty::Moderate
            } else {
                Difficulty::Hard
            },
            budget_impact: amount,
            allocation_move: None,
            goal: mutated,
        });
    }
}

fn category_candidates(goal: &Goal, profile: &Profile, out: &mut Vec<Candidate>) {
    if goal.category != GoalCategory::Retirement {
        return;
    }
    let extra_monthly = profile.monthly_income() * TAX_ADVANTAGED_INCOME_SHARE;
    if extra_monthly <= 0.0 {
        return;
    }
    let mut mutated = goal.clone();
    mutated.monthly_contribution = goal.monthly_contribution + extra_monthly;
    out.push(Candidate {
        kind: RecommendationKind::TaxAdvantagedContribution,
        value: extra_monthly,
        description: format!(
            "Route an extra {extra_monthly:.0} per month through a tax-advantaged retirement account"
        ),
        difficulty: Difficulty::Moderate,
        budget_impact: extra_monthly * 12.0,
        allocation_move: None,
        goal: mutated,
    });
}
