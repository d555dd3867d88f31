//! Simulation inputs: the fully-resolved, cache-keyed description of one
//! Monte Carlo run.
//!
//! Two logically equal inputs must hash to the same key, and two different
//! inputs must (with overwhelming probability) hash to different keys. The
//! canonical encoding fixes field order and rounds every float to 12
//! significant digits before hashing, so equality is parameter-normalized
//! rather than bit-exact.

use std::hash::Hasher;

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::model::goal::{Allocation, AssetClass};

/// Per-asset-class return assumptions: `(expected_return, volatility)` in
/// [`AssetClass::ALL`] order.
pub type AssetParams = [(f64, f64); 5];

/// Everything that determines a trial array, and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputs {
    pub initial_amount: f64,
    /// Year-end contribution per year; length equals `years`.
    pub contributions: Vec<f64>,
    pub years: u32,
    /// Target allocation per year; length equals `years`. A static policy
    /// repeats the same vector.
    pub allocations: Vec<Allocation>,
    pub asset_params: AssetParams,
    pub trial_count: usize,
    pub root_seed: u64,
    pub include_trajectories: bool,
}

impl SimulationInputs {
    /// Canonical deterministic encoding: fixed field order, floats rounded
    /// to 12 significant digits. This string is the sole input to
    /// [`SimulationInputs::fingerprint`], which makes key derivation
    /// testable on its own.
    #[must_use]
    pub fn canonical_encoding(&self) -> String {
        let mut out = String::with_capacity(256 + self.years as usize * 96);
        out.push_str("v1");
        push_field(&mut out, "initial", self.initial_amount);
        out.push_str(";years=");
        out.push_str(&self.years.to_string());
        out.push_str(";trials=");
        out.push_str(&self.trial_count.to_string());
        out.push_str(";seed=");
        out.push_str(&self.root_seed.to_string());
        out.push_str(";traj=");
        out.push(if self.include_trajectories { '1' } else { '0' });

        out.push_str(";contrib=");
        for (i, c) in self.contributions.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&canonical_float(*c));
        }

        out.push_str(";alloc=");
        for (i, alloc) in self.allocations.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            let weights = alloc.weights();
            for (j, w) in weights.iter().enumerate() {
                if j > 0 {
                    out.push(',');
                }
                out.push_str(&canonical_float(*w));
            }
        }

        out.push_str(";assets=");
        for (i, class) in AssetClass::ALL.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            let (mean, vol) = self.asset_params[class.index()];
            out.push_str(class.name());
            out.push(':');
            out.push_str(&canonical_float(mean));
            out.push(',');
            out.push_str(&canonical_float(vol));
        }
        out
    }

    /// Stable 64-bit content hash of the canonical encoding, hex-formatted.
    /// Used as the result-cache key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = FxHasher::default();
        hasher.write(self.canonical_encoding().as_bytes());
        format!("{:016x}", hasher.finish())
    }
}

fn push_field(out: &mut String, name: &str, value: f64) {
    out.push(';');
    out.push_str(name);
    out.push('=');
    out.push_str(&canonical_float(value));
}

/// Round to 12 significant digits via scientific notation. Negative zero
/// normalizes to zero so `-0.0` and `0.0` key identically.
fn canonical_float(value: f64) -> String {
    let v = if value == 0.0 { 0.0 } else { value };
    format!("{v:.11e}")
}

/// The outcome of one simulation run: terminal values in trial-index order,
/// optional yearly trajectories, and the count of trials that degenerated
/// to non-finite values (reported as NaN sentinels in the arrays).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSet {
    pub terminal_values: Vec<f64>,
    /// Per-trial running values, length `years + 1` including year 0.
    /// Present only when the inputs requested trajectories.
    pub trajectories: Option<Vec<Vec<f64>>>,
    pub degenerate_trials: usize,
}

impl TrialSet {
    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.terminal_values.len()
    }

    /// Stable hash over the exact bit patterns of the terminal values.
    /// Determinism tests compare this across runs and worker counts.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for v in &self.terminal_values {
            hasher.write_u64(v.to_bits());
        }
        hasher.finish()
    }
}
