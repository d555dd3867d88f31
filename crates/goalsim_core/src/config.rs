//! Engine configuration.
//!
//! Every field is optional in serialized form and falls back to the
//! documented default, so a partial config file deserializes cleanly.
//! `EngineConfig::from_env` overlays `GOALSIM_*` environment variables on
//! top of the defaults; unparseable values are ignored with a warning.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached results before LRU eviction.
    pub max_entries: usize,
    /// Entry lifetime in seconds; expired entries read as misses.
    pub ttl_seconds: u64,
    /// Auto-save cadence in seconds; 0 disables the auto-save task.
    pub save_interval_seconds: u64,
    /// Snapshot directory.
    pub dir: PathBuf,
    /// Snapshot filename inside `dir`.
    pub file: String,
    /// Force the cache off entirely.
    pub disabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl_seconds: 3600,
            save_interval_seconds: 300,
            dir: PathBuf::from("data/cache"),
            file: "mc_cache.bin".to_string(),
            disabled: false,
        }
    }
}

impl CacheConfig {
    /// Full path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Trials per analysis when the caller does not specify.
    pub default_trials: usize,
    /// Hard floor on trials; below this the driver rejects the run.
    pub min_trials: usize,
    /// Ceiling on trials; above this the driver rejects the run.
    pub max_trials: usize,
    /// Root seed when the caller does not specify one.
    pub default_seed: u64,
    /// Concurrent-analysis ceiling; further calls get `BusyRejected`.
    pub max_concurrent_analyses: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            default_trials: 1000,
            min_trials: 500,
            max_trials: 100_000,
            default_seed: 42,
            max_concurrent_analyses: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub sim: SimConfig,
}

impl EngineConfig {
    /// Defaults overlaid with any `GOALSIM_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        overlay(&mut config.cache.max_entries, "GOALSIM_CACHE_MAX_ENTRIES");
        overlay(&mut config.cache.ttl_seconds, "GOALSIM_CACHE_TTL_SECONDS");
        overlay(
            &mut config.cache.save_interval_seconds,
            "GOALSIM_CACHE_SAVE_INTERVAL_SECONDS",
        );
        if let Ok(dir) = std::env::var("GOALSIM_CACHE_DIR") {
            config.cache.dir = PathBuf::from(dir);
        }
        if let Ok(file) = std::env::var("GOALSIM_CACHE_FILE") {
            config.cache.file = file;
        }
        overlay(&mut config.cache.disabled, "GOALSIM_CACHE_DISABLED");
        overlay(&mut config.sim.default_trials, "GOALSIM_SIM_DEFAULT_TRIALS");
        overlay(&mut config.sim.min_trials, "GOALSIM_SIM_MIN_TRIALS");
        overlay(&mut config.sim.max_trials, "GOALSIM_SIM_MAX_TRIALS");
        overlay(&mut config.sim.default_seed, "GOALSIM_SIM_DEFAULT_SEED");
        overlay(
            &mut config.sim.max_concurrent_analyses,
            "GOALSIM_SIM_MAX_CONCURRENT",
        );
        config
    }
}

fn overlay<T: std::str::FromStr>(slot: &mut T, key: &str) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!(key, value = %raw, "ignoring unparseable config override"),
        }
    }
}
