//! Integration tests for the goal probability engine
//!
//! Tests are organized by topic:
//! - `scenarios` - Literal regression scenarios with fixed seeds
//! - `determinism` - Reproducibility, range and serialization invariants
//! - `cache_persistence` - Snapshot round-trips and key injectivity
//! - `recommendations` - Recommender ranking, validity and sensitivity

mod cache_persistence;
mod support;
