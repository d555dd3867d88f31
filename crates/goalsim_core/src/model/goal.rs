//! Goal definitions: categories, flexibility, asset allocation.
//!
//! A [`Goal`] is immutable within an analysis. Validation happens up front
//! via [`Goal::validate`]; everything downstream may assume the invariants
//! hold (positive target, future target date, normalized allocation).

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Tolerance for allocation weights summing to 1.
pub const ALLOCATION_SUM_TOLERANCE: f64 = 1e-6;

/// The closed set of modeled asset classes.
///
/// Order matters: it fixes the kernel's draw order and the layout of every
/// per-asset array, so it is part of the determinism contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Debt,
    Gold,
    RealEstate,
    Cash,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Equity,
        AssetClass::Debt,
        AssetClass::Gold,
        AssetClass::RealEstate,
        AssetClass::Cash,
    ];

    /// Position of this class in every per-asset array.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            AssetClass::Equity => 0,
            AssetClass::Debt => 1,
            AssetClass::Gold => 2,
            AssetClass::RealEstate => 3,
            AssetClass::Cash => 4,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::Debt => "debt",
            AssetClass::Gold => "gold",
            AssetClass::RealEstate => "real_estate",
            AssetClass::Cash => "cash",
        }
    }
}

/// Portfolio weights per asset class. Weights are fractions in [0, 1] and
/// must sum to 1 within [`ALLOCATION_SUM_TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Allocation {
    #[serde(default)]
    pub equity: f64,
    #[serde(default)]
    pub debt: f64,
    #[serde(default)]
    pub gold: f64,
    #[serde(default)]
    pub real_estate: f64,
    #[serde(default)]
    pub cash: f64,
}

impl Allocation {
    #[must_use]
    pub fn new(equity: f64, debt: f64, gold: f64, real_estate: f64, cash: f64) -> Self {
        Self {
            equity,
            debt,
            gold,
            real_estate,
            cash,
        }
    }

    /// All-cash allocation (used by emergency funds and tests).
    #[must_use]
    pub fn all_cash() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 1.0)
    }

    /// Weights in [`AssetClass::ALL`] order.
    #[must_use]
    pub fn weights(&self) -> [f64; 5] {
        [self.equity, self.debt, self.gold, self.real_estate, self.cash]
    }

    #[must_use]
    pub fn weight(&self, class: AssetClass) -> f64 {
        self.weights()[class.index()]
    }

    pub fn set_weight(&mut self, class: AssetClass, weight: f64) {
        match class {
            AssetClass::Equity => self.equity = weight,
            AssetClass::Debt => self.debt = weight,
            AssetClass::Gold => self.gold = weight,
            AssetClass::RealEstate => self.real_estate = weight,
            AssetClass::Cash => self.cash = weight,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.weights().iter().sum()
    }

    /// Rescale weights so they sum to exactly 1. Returns an all-cash
    /// allocation when the sum is not positive (there is nothing sensible
    /// to rescale).
    #[must_use]
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 || !total.is_finite() {
            return Self::all_cash();
        }
        Self::new(
            self.equity / total,
            self.debt / total,
            self.gold / total,
            self.real_estate / total,
            self.cash / total,
        )
    }

    /// Move `points` of weight from one class to another, clamping so both
    /// stay in [0, 1]. The actual amount moved is limited by the donor's
    /// weight and the receiver's headroom.
    #[must_use]
    pub fn shifted(&self, from: AssetClass, to: AssetClass, points: f64) -> Self {
        let movable = points.min(self.weight(from)).min(1.0 - self.weight(to)).max(0.0);
        let mut out = *self;
        out.set_weight(from, self.weight(from) - movable);
        out.set_weight(to, self.weight(to) + movable);
        out
    }

    fn validate(&self) -> Result<()> {
        for class in AssetClass::ALL {
            let w = self.weight(class);
            if !w.is_finite() || w < 0.0 {
                return Err(EngineError::InvalidGoal(format!(
                    "allocation weight for {} is {w}",
                    class.name()
                )));
            }
        }
        let total = self.sum();
        if (total - 1.0).abs() > ALLOCATION_SUM_TOLERANCE {
            return Err(EngineError::InvalidGoal(format!(
                "allocation weights sum to {total}, expected 1"
            )));
        }
        Ok(())
    }
}

/// The closed set of goal categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalCategory {
    Retirement,
    Education,
    EmergencyFund,
    HomePurchase,
    DebtRepayment,
    Discretionary,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
}

/// How negotiable the goal's target and date are. Gates which adjustment
/// templates the recommender may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flexibility {
    Fixed,
    SomewhatFlexible,
    VeryFlexible,
}

/// A long-horizon financial goal, as handed to the engine by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub category: GoalCategory,
    pub target_amount: f64,
    pub current_amount: f64,
    pub monthly_contribution: f64,
    pub target_date: Date,
    pub importance: Importance,
    pub flexibility: Flexibility,
    pub allocation: Allocation,
}

impl Goal {
    /// Whole years between the analysis date and the target date (year
    /// precision, per the data model).
    #[must_use]
    pub fn horizon_years(&self, as_of: Date) -> u32 {
        (self.target_date.year() - as_of.year()).max(0) as u32
    }

    /// True when the goal is already funded at the analysis date.
    #[must_use]
    pub fn is_achieved(&self) -> bool {
        self.current_amount >= self.target_amount
    }

    /// Check the structural invariants: positive finite target, future
    /// target date (unless already achieved), normalized allocation.
    pub fn validate(&self, as_of: Date) -> Result<()> {
        if !self.target_amount.is_finite() || self.target_amount <= 0.0 {
            return Err(EngineError::InvalidGoal(format!(
                "target amount must be positive, got {}",
                self.target_amount
            )));
        }
        if !self.current_amount.is_finite() || self.current_amount < 0.0 {
            return Err(EngineError::InvalidGoal(format!(
                "current amount must be non-negative, got {}",
                self.current_amount
            )));
        }
        if !self.monthly_contribution.is_finite() || self.monthly_contribution < 0.0 {
            return Err(EngineError::InvalidGoal(format!(
                "monthly contribution must be non-negative, got {}",
                self.monthly_contribution
            )));
        }
        if self.target_date <= as_of && !self.is_achieved() {
            return Err(EngineError::InvalidGoal(format!(
                "target date {} is not after the analysis date {as_of}",
                self.target_date
            )));
        }
        self.allocation.validate()
    }
}

/// Fluent builder for [`Goal`], validating on [`GoalBuilder::build`].
///
/// Defaults: custom category, medium importance, somewhat-flexible, all-cash
/// allocation, zero balances.
#[derive(Debug, Clone)]
pub struct GoalBuilder {
    goal: Goal,
    as_of: Date,
}

impl GoalBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>, as_of: Date) -> Self {
        Self {
            goal: Goal {
                id: id.into(),
                category: GoalCategory::Custom,
                target_amount: 0.0,
                current_amount: 0.0,
                monthly_contribution: 0.0,
                target_date: as_of,
                importance: Importance::Medium,
                flexibility: Flexibility::SomewhatFlexible,
                allocation: Allocation::all_cash(),
            },
            as_of,
        }
    }

    #[must_use]
    pub fn category(mut self, category: GoalCategory) -> Self {
        self.goal.category = category;
        self
    }

    #[must_use]
    pub fn target(mut self, amount: f64) -> Self {
        self.goal.target_amount = amount;
        self
    }

    #[must_use]
    pub fn current(mut self, amount: f64) -> Self {
        self.goal.current_amount = amount;
        self
    }

    #[must_use]
    pub fn monthly(mut self, contribution: f64) -> Self {
        self.goal.monthly_contribution = contribution;
        self
    }

    /// Target date expressed as a number of years from the analysis date.
    #[must_use]
    pub fn years(mut self, years: i16) -> Self {
        self.goal.target_date = self
            .as_of
            .saturating_add(jiff::Span::new().years(i64::from(years)));
        self
    }

    #[must_use]
    pub fn target_date(mut self, date: Date) -> Self {
        self.goal.target_date = date;
        self
    }

    #[must_use]
    pub fn importance(mut self, importance: Importance) -> Self {
        self.goal.importance = importance;
        self
    }

    #[must_use]
    pub fn flexibility(mut self, flexibility: Flexibility) -> Self {
        self.goal.flexibility = flexibility;
        self
    }

    #[must_use]
    pub fn allocation(mut self, allocation: Allocation) -> Self {
        self.goal.allocation = allocation;
        self
    }

    pub fn build(self) -> Result<Goal> {
        self.goal.validate(self.as_of)?;
        Ok(self.goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> Date {
        jiff::civil::date(2025, 1, 1)
    }

    #[test]
    fn test_allocation_normalized_sums_to_one() {
        let alloc = Allocation::new(6.0, 3.0, 0.5, 0.0, 0.5);
        let norm = alloc.normalized();
        assert!((norm.sum() - 1.0).abs() < 1e-12);
        assert!((norm.equity - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_allocation_shift_respects_bounds() {
        let alloc = Allocation::new(0.6, 0.3, 0.05, 0.0, 0.05);
        let shifted = alloc.shifted(AssetClass::Debt, AssetClass::Equity, 0.5);
        // Only 0.3 is available to move out of debt
        assert!((shifted.debt - 0.0).abs() < 1e-12);
        assert!((shifted.equity - 0.9).abs() < 1e-12);
        assert!((shifted.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_goal_rejects_non_positive_target() {
        let result = GoalBuilder::new("g1", as_of())
            .target(0.0)
            .years(5)
            .build();
        assert!(matches!(result, Err(EngineError::InvalidGoal(_))));
    }

    #[test]
    fn test_goal_rejects_past_target_date() {
        let result = GoalBuilder::new("g1", as_of())
            .target(100_000.0)
            .target_date(jiff::civil::date(2020, 1, 1))
            .build();
        assert!(matches!(result, Err(EngineError::InvalidGoal(_))));
    }

    #[test]
    fn test_achieved_goal_allows_past_date() {
        let goal = GoalBuilder::new("g1", as_of())
            .target(100_000.0)
            .current(150_000.0)
            .target_date(jiff::civil::date(2020, 1, 1))
            .build()
            .unwrap();
        assert!(goal.is_achieved());
    }

    #[test]
    fn test_goal_rejects_unnormalized_allocation() {
        let result = GoalBuilder::new("g1", as_of())
            .target(100_000.0)
            .years(5)
            .allocation(Allocation::new(0.9, 0.3, 0.0, 0.0, 0.0))
            .build();
        assert!(matches!(result, Err(EngineError::InvalidGoal(_))));
    }

    #[test]
    fn test_horizon_uses_year_precision() {
        let goal = GoalBuilder::new("g1", as_of())
            .target(100_000.0)
            .years(17)
            .build()
            .unwrap();
        assert_eq!(goal.horizon_years(as_of()), 17);
    }
}
