//! Contribution and allocation scheduling.
//!
//! Expands a goal's monthly contribution into a per-year contribution
//! vector and its allocation into a per-year allocation vector, one entry
//! per horizon year. Glide-path policies shift growth assets toward debt as
//! the target approaches; which policy applies is a per-category decision.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::goal::{Allocation, AssetClass, GoalCategory};

/// How contributions evolve over the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContributionPattern {
    /// Same amount every year.
    #[default]
    Constant,
    /// Fixed annual percentage increase.
    Growing { annual_growth: f64 },
    /// Constant plus one extra amount in the first year.
    FrontLoaded { lumpsum: f64 },
    /// Explicit per-year amounts; length must equal the horizon.
    Custom { yearly: Vec<f64> },
}

/// Expand a monthly contribution into per-year amounts of length `years`.
pub fn contribution_schedule(
    monthly_contribution: f64,
    pattern: &ContributionPattern,
    years: u32,
) -> Result<Vec<f64>> {
    let annual = monthly_contribution * 12.0;
    let years = years as usize;
    let schedule = match pattern {
        ContributionPattern::Constant => vec![annual; years],
        ContributionPattern::Growing { annual_growth } => (0..years)
            .map(|t| annual * (1.0 + annual_growth).powi(t as i32))
            .collect(),
        ContributionPattern::FrontLoaded { lumpsum } => {
            let mut schedule = vec![annual; years];
            if let Some(first) = schedule.first_mut() {
                *first += lumpsum;
            }
            schedule
        }
        ContributionPattern::Custom { yearly } => {
            if yearly.len() != years {
                return Err(EngineError::ScheduleMismatch {
                    expected: years,
                    got: yearly.len(),
                });
            }
            yearly.clone()
        }
    };
    Ok(schedule)
}

/// Time-varying allocation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Same allocation every year.
    #[default]
    Static,
    /// Target-date glide: half the starting equity weight migrates to debt
    /// linearly over the horizon.
    RetirementGlide,
    /// Static until three years before target, then equity winds down to
    /// debt linearly over the final stretch.
    EducationDerisk,
    /// Growth assets are folded into debt up front; the schedule is then
    /// static cash/debt only.
    EmergencyStatic,
}

impl AllocationPolicy {
    /// The policy each category uses when the caller does not choose one.
    #[must_use]
    pub fn for_category(category: GoalCategory) -> Self {
        match category {
            GoalCategory::Retirement => AllocationPolicy::RetirementGlide,
            GoalCategory::Education => AllocationPolicy::EducationDerisk,
            GoalCategory::EmergencyFund => AllocationPolicy::EmergencyStatic,
            _ => AllocationPolicy::Static,
        }
    }
}

/// Expand an allocation into per-year vectors of length `years`. Every
/// emitted vector is normalized to sum 1.
#[must_use]
pub fn allocation_schedule(
    allocation: Allocation,
    policy: AllocationPolicy,
    years: u32,
) -> Vec<Allocation> {
    let base = allocation.normalized();
    let years = years as usize;
    match policy {
        AllocationPolicy::Static => vec![base; years],
        AllocationPolicy::RetirementGlide => {
            let total_shift = base.equity * 0.5;
            (0..years)
                .map(|t| {
                    // Year 1 keeps the starting mix; the last year carries the
                    // full shift.
                    let progress = if years > 1 {
                        t as f64 / (years - 1) as f64
                    } else {
                        0.0
                    };
                    base.shifted(AssetClass::Equity, AssetClass::Debt, total_shift * progress)
                        .normalized()
                })
                .collect()
        }
        AllocationPolicy::EducationDerisk => (0..years)
            .map(|t| {
                let years_left = years - t;
                if years_left > 3 {
                    base
                } else {
                    // 3 years out keeps 2/3 of equity, 2 years out 1/3,
                    // final year none.
                    let keep = (years_left as f64 - 1.0) / 3.0;
                    let shift = base.equity * (1.0 - keep);
                    base.shifted(AssetClass::Equity, AssetClass::Debt, shift)
                        .normalized()
                }
            })
            .collect(),
        AllocationPolicy::EmergencyStatic => {
            let risky = base.equity + base.gold + base.real_estate;
            let safe = Allocation::new(0.0, base.debt + risky, 0.0, 0.0, base.cash).normalized();
            vec![safe; years]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growth_mix() -> Allocation {
        Allocation::new(0.6, 0.3, 0.05, 0.0, 0.05)
    }

    #[test]
    fn test_constant_schedule_length_and_value() {
        let schedule = contribution_schedule(50_000.0, &ContributionPattern::Constant, 17).unwrap();
        assert_eq!(schedule.len(), 17);
        assert!(schedule.iter().all(|c| (c - 600_000.0).abs() < 1e-9));
    }

    #[test]
    fn test_growing_schedule_compounds() {
        let schedule = contribution_schedule(
            10_000.0,
            &ContributionPattern::Growing { annual_growth: 0.10 },
            3,
        )
        .unwrap();
        assert!((schedule[0] - 120_000.0).abs() < 1e-9);
        assert!((schedule[1] - 132_000.0).abs() < 1e-9);
        assert!((schedule[2] - 145_200.0).abs() < 1e-9);
    }

    #[test]
    fn test_front_loaded_adds_to_first_year() {
        let schedule = contribution_schedule(
            10_000.0,
            &ContributionPattern::FrontLoaded { lumpsum: 200_000.0 },
            5,
        )
        .unwrap();
        assert!((schedule[0] - 320_000.0).abs() < 1e-9);
        assert!((schedule[1] - 120_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_schedule_must_match_horizon() {
        let result = contribution_schedule(
            0.0,
            &ContributionPattern::Custom {
                yearly: vec![1.0, 2.0],
            },
            3,
        );
        assert!(matches!(
            result,
            Err(EngineError::ScheduleMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_static_allocation_repeats() {
        let schedule = allocation_schedule(growth_mix(), AllocationPolicy::Static, 10);
        assert_eq!(schedule.len(), 10);
        assert_eq!(schedule[0], schedule[9]);
        assert!((schedule[0].sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_retirement_glide_moves_equity_to_debt() {
        let schedule = allocation_schedule(growth_mix(), AllocationPolicy::RetirementGlide, 20);
        assert_eq!(schedule.len(), 20);
        // Equity decreases monotonically; the final year holds half the start
        for window in schedule.windows(2) {
            assert!(window[1].equity <= window[0].equity + 1e-12);
        }
        assert!((schedule[0].equity - 0.6).abs() < 1e-9);
        assert!((schedule[19].equity - 0.3).abs() < 1e-9);
        assert!((schedule[19].debt - 0.6).abs() < 1e-9);
        for alloc in &schedule {
            assert!((alloc.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_education_derisks_final_three_years() {
        let schedule = allocation_schedule(growth_mix(), AllocationPolicy::EducationDerisk, 10);
        // Years with more than 3 remaining keep the base mix
        assert_eq!(schedule[0], growth_mix().normalized());
        assert_eq!(schedule[6], growth_mix().normalized());
        // Final year is fully out of equity
        assert!(schedule[9].equity.abs() < 1e-9);
        assert!(schedule[8].equity < schedule[7].equity);
    }

    #[test]
    fn test_emergency_fund_holds_no_growth_assets() {
        let schedule = allocation_schedule(growth_mix(), AllocationPolicy::EmergencyStatic, 5);
        for alloc in &schedule {
            assert!(alloc.equity.abs() < 1e-12);
            assert!(alloc.gold.abs() < 1e-12);
            assert!(alloc.real_estate.abs() < 1e-12);
            assert!((alloc.sum() - 1.0).abs() < 1e-9);
        }
    }
}
