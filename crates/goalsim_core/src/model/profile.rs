//! User profile fields the engine consumes.
//!
//! Anything beyond these fields (KYC data, linked accounts, ...) is opaque
//! to the core and lives with the persistence layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub age: u8,
    pub annual_income: f64,
    pub monthly_expenses: f64,
    pub dependents: u8,
    pub risk_tolerance: RiskTolerance,
    pub country: String,
}

impl Profile {
    #[must_use]
    pub fn monthly_income(&self) -> f64 {
        self.annual_income / 12.0
    }

    /// Age-based ceiling on equity exposure, used to bound allocation-shift
    /// recommendations: (110 - age) / 100, clamped to [0, 1].
    #[must_use]
    pub fn equity_ceiling(&self) -> f64 {
        ((110.0 - f64::from(self.age)) / 100.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equity_ceiling_clamps() {
        let mut profile = Profile {
            age: 30,
            annual_income: 1_200_000.0,
            monthly_expenses: 50_000.0,
            dependents: 0,
            risk_tolerance: RiskTolerance::Moderate,
            country: "IN".to_string(),
        };
        assert!((profile.equity_ceiling() - 0.8).abs() < 1e-12);

        profile.age = 5;
        assert!((profile.equity_ceiling() - 1.0).abs() < 1e-12);
    }
}
