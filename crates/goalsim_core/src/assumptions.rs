//! Market assumption provider.
//!
//! Resolves expected return and volatility per asset class, inflation per
//! goal category, and optional category horizon overrides. Values come from
//! compiled defaults overlaid with configuration at construction and are
//! immutable afterwards; every lookup is a plain in-process read.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::goal::{AssetClass, Goal, GoalCategory};
use crate::model::inputs::AssetParams;

/// Default annual (expected_return, volatility) per asset class.
pub const DEFAULT_EQUITY: (f64, f64) = (0.10, 0.18);
pub const DEFAULT_DEBT: (f64, f64) = (0.06, 0.05);
pub const DEFAULT_GOLD: (f64, f64) = (0.07, 0.15);
pub const DEFAULT_REAL_ESTATE: (f64, f64) = (0.08, 0.12);
pub const DEFAULT_CASH: (f64, f64) = (0.03, 0.01);

/// Default annual inflation, and the education-specific override (education
/// costs historically outrun general inflation).
pub const DEFAULT_INFLATION: f64 = 0.06;
pub const DEFAULT_EDUCATION_INFLATION: f64 = 0.08;

/// Configuration overrides for the assumption provider. All fields
/// optional; omitted entries use the compiled defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssumptionOverrides {
    /// Per-asset-class (expected_return, volatility).
    pub returns: HashMap<AssetClass, (f64, f64)>,
    /// Per-category inflation rate.
    pub inflation: HashMap<GoalCategory, f64>,
    /// Base inflation when no category override applies.
    pub base_inflation: Option<f64>,
    /// Per-category horizon cap in years.
    pub horizon_caps: HashMap<GoalCategory, u32>,
}

/// Immutable resolved assumptions.
#[derive(Debug, Clone)]
pub struct MarketAssumptions {
    returns: [(f64, f64); 5],
    base_inflation: f64,
    category_inflation: HashMap<GoalCategory, f64>,
    horizon_caps: HashMap<GoalCategory, u32>,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        // Defaults are known-valid, so this cannot actually fail
        Self::new(AssumptionOverrides::default()).unwrap_or(Self {
            returns: [
                DEFAULT_EQUITY,
                DEFAULT_DEBT,
                DEFAULT_GOLD,
                DEFAULT_REAL_ESTATE,
                DEFAULT_CASH,
            ],
            base_inflation: DEFAULT_INFLATION,
            category_inflation: HashMap::new(),
            horizon_caps: HashMap::new(),
        })
    }
}

impl MarketAssumptions {
    /// Build from overrides, validating every numeric: means must be
    /// finite (negative is allowed for catastrophic-scenario testing),
    /// volatilities finite and non-negative.
    pub fn new(overrides: AssumptionOverrides) -> Result<Self> {
        let mut returns = [
            DEFAULT_EQUITY,
            DEFAULT_DEBT,
            DEFAULT_GOLD,
            DEFAULT_REAL_ESTATE,
            DEFAULT_CASH,
        ];
        for (class, params) in &overrides.returns {
            returns[class.index()] = *params;
        }
        for (class, (mean, vol)) in AssetClass::ALL.iter().zip(returns.iter()) {
            if !mean.is_finite() {
                return Err(EngineError::InvalidGoal(format!(
                    "expected return for {} is not finite",
                    class.name()
                )));
            }
            if !vol.is_finite() || *vol < 0.0 {
                return Err(EngineError::InvalidGoal(format!(
                    "volatility for {} must be finite and non-negative, got {vol}",
                    class.name()
                )));
            }
        }

        let mut category_inflation = HashMap::new();
        category_inflation.insert(GoalCategory::Education, DEFAULT_EDUCATION_INFLATION);
        for (category, rate) in overrides.inflation {
            if !rate.is_finite() {
                return Err(EngineError::InvalidGoal(format!(
                    "inflation override for {category:?} is not finite"
                )));
            }
            category_inflation.insert(category, rate);
        }

        let base_inflation = overrides.base_inflation.unwrap_or(DEFAULT_INFLATION);
        if !base_inflation.is_finite() {
            return Err(EngineError::InvalidGoal(
                "base inflation is not finite".to_string(),
            ));
        }

        Ok(Self {
            returns,
            base_inflation,
            category_inflation,
            horizon_caps: overrides.horizon_caps,
        })
    }

    /// `(expected_return, volatility)` for one asset class.
    #[must_use]
    pub fn returns_for(&self, class: AssetClass) -> (f64, f64) {
        self.returns[class.index()]
    }

    /// All five `(expected_return, volatility)` pairs in enum order, the
    /// form the simulation inputs carry.
    #[must_use]
    pub fn asset_params(&self) -> AssetParams {
        self.returns
    }

    /// Inflation rate for a goal category.
    #[must_use]
    pub fn inflation_for(&self, category: GoalCategory) -> f64 {
        self.category_inflation
            .get(&category)
            .copied()
            .unwrap_or(self.base_inflation)
    }

    /// Category-specific horizon cap, when one is configured and binds.
    #[must_use]
    pub fn horizon_override_for(&self, category: GoalCategory, goal: &Goal, as_of: jiff::civil::Date) -> Option<u32> {
        let cap = *self.horizon_caps.get(&category)?;
        (goal.horizon_years(as_of) > cap).then_some(cap)
    }
}
