//! Error taxonomy for the goal probability engine.
//!
//! Validation errors surface to the caller immediately. Kernel-level trial
//! failures are recoverable below the degenerate-rate threshold. Cache
//! errors are never fatal to the simulate/aggregate path; the cache logs
//! and degrades to in-memory-only operation instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Goal failed structural validation (non-positive target, past target
    /// date, allocation weights not summing to 1, ...).
    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    /// Profile is missing a field the requested analysis needs.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Contribution or allocation schedule length does not match the horizon.
    #[error("schedule mismatch: expected {expected} entries, got {got}")]
    ScheduleMismatch { expected: usize, got: usize },

    /// Trial count below the configured floor.
    #[error("insufficient trials: {requested} requested, minimum is {minimum}")]
    InsufficientTrials { requested: usize, minimum: usize },

    /// Trial count above the configured ceiling.
    #[error("trial count {requested} exceeds limit {maximum}")]
    TrialCountExceedsLimit { requested: usize, maximum: usize },

    /// The analysis deadline expired; in-flight work was discarded.
    #[error("analysis deadline exceeded")]
    DeadlineExceeded,

    /// The concurrent-analysis ceiling was hit.
    #[error("engine busy: {active} analyses active, limit is {limit}")]
    BusyRejected { active: usize, limit: usize },

    /// More than the tolerated share of trials produced non-finite values.
    #[error("degenerate trial rate too high: {degenerate} of {total} trials")]
    DegenerateTrialRate { degenerate: usize, total: usize },

    /// A cache snapshot was unreadable. Recovered internally by ignoring
    /// the file; callers of analyze/recommend never see this variant.
    #[error("cache corruption: {0}")]
    CacheCorruption(String),

    /// A result failed to serialize or parse.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
