//! Error types.
//!
//! None of these reach callers of the cache surface: internal faults are
//! logged and degraded to a cache miss or a skipped step.

use thiserror::Error;

/// Internal cache faults.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Footprint accounting overflowed while summing {entries} entries")]
    SizeOverflow { entries: usize },
}

/// Invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("capacity.max_entries must be at least 1")]
    ZeroCapacity,

    #[error("pressure.memory_ceiling_bytes must be non-zero")]
    ZeroMemoryCeiling,

    #[error("{0} must be non-zero")]
    ZeroInterval(&'static str),

    #[error("{name} must be in (0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be a finite, non-negative weight, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
}

/// Failure to build a cache registry.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
