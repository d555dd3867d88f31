//! Stochastic projection kernel: one Monte Carlo trial.
//!
//! Projects a portfolio year by year under lognormal asset returns. The
//! scalar loop below is the normative definition of the math; the draw
//! order (years outer, asset classes in [`AssetClass::ALL`] order) is fixed
//! so that any batched reformulation must reproduce it bit for bit.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::error::{EngineError, Result};
use crate::model::goal::AssetClass;
use crate::model::inputs::SimulationInputs;

/// Sanity band on annual gross returns; keeps every intermediate finite
/// even under extreme volatility overrides.
pub const GROSS_RETURN_MIN: f64 = 0.01;
pub const GROSS_RETURN_MAX: f64 = 10.0;

/// One trial's outcome. A non-finite portfolio value aborts the trial; the
/// terminal value is then a NaN sentinel for the aggregator to filter.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub terminal_value: f64,
    /// Running value per year, length `years + 1` (year 0 first), when
    /// requested. Degenerate trials pad the remainder with NaN.
    pub trajectory: Option<Vec<f64>>,
}

impl TrialOutcome {
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.terminal_value.is_finite()
    }
}

/// Per-run projection state shared across trials: validated inputs and the
/// prepared sampling distributions. Construction validates once; running a
/// trial is then infallible.
pub struct ProjectionKernel<'a> {
    inputs: &'a SimulationInputs,
    /// `Normal(mu - 0.5 * vol^2, vol)` per asset class, `None` where the
    /// volatility is zero and the gross return is deterministic.
    normals: [Option<Normal<f64>>; 5],
    /// `exp(mu)` per asset class, the zero-volatility gross return.
    deterministic_gross: [f64; 5],
}

impl<'a> ProjectionKernel<'a> {
    pub fn new(inputs: &'a SimulationInputs) -> Result<Self> {
        let years = inputs.years as usize;
        if inputs.contributions.len() != years {
            return Err(EngineError::ScheduleMismatch {
                expected: years,
                got: inputs.contributions.len(),
            });
        }
        if inputs.allocations.len() != years {
            return Err(EngineError::ScheduleMismatch {
                expected: years,
                got: inputs.allocations.len(),
            });
        }

        let mut normals: [Option<Normal<f64>>; 5] = [None; 5];
        let mut deterministic_gross = [1.0; 5];
        for class in AssetClass::ALL {
            let (mean, vol) = inputs.asset_params[class.index()];
            deterministic_gross[class.index()] =
                mean.exp().clamp(GROSS_RETURN_MIN, GROSS_RETURN_MAX);
            if vol > 0.0 {
                let normal = Normal::new(mean - 0.5 * vol * vol, vol).map_err(|_| {
                    EngineError::InvalidGoal(format!(
                        "cannot sample returns for {}: mean {mean}, vol {vol}",
                        class.name()
                    ))
                })?;
                normals[class.index()] = Some(normal);
            }
        }

        Ok(Self {
            inputs,
            normals,
            deterministic_gross,
        })
    }

    /// Run one trial from its sub-seed.
    #[must_use]
    pub fn run_trial(&self, seed: u64) -> TrialOutcome {
        let years = self.inputs.years as usize;
        let mut rng = SmallRng::seed_from_u64(seed);

        let mut value = self.inputs.initial_amount;
        let mut trajectory = self.inputs.include_trajectories.then(|| {
            let mut t = Vec::with_capacity(years + 1);
            t.push(value);
            t
        });

        for year in 0..years {
            let weights = self.inputs.allocations[year].weights();
            let mut gross = 0.0;
            for idx in 0..AssetClass::ALL.len() {
                let asset_gross = match &self.normals[idx] {
                    Some(normal) => normal
                        .sample(&mut rng)
                        .exp()
                        .clamp(GROSS_RETURN_MIN, GROSS_RETURN_MAX),
                    None => self.deterministic_gross[idx],
                };
                gross += weights[idx] * asset_gross;
            }

            value = value * gross + self.inputs.contributions[year];

            if !value.is_finite() {
                if let Some(t) = trajectory.as_mut() {
                    t.resize(years + 1, f64::NAN);
                }
                return TrialOutcome {
                    terminal_value: f64::NAN,
                    trajectory,
                };
            }
            if let Some(t) = trajectory.as_mut() {
                t.push(value);
            }
        }

        TrialOutcome {
            terminal_value: value,
            trajectory,
        }
    }
}
