//! Runtime configuration for scripture-cache.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! All cache tunables (capacity, eviction weights, pressure ceiling, janitor
//! timing) live here and are exposed for override by the embedding application.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Command-line arguments for the reading-session simulator.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "scripture-cache",
    about = "Simulates reading sessions against the scripture content cache"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Number of simulated reading sessions.
    #[arg(long, default_value_t = 4)]
    pub sessions: usize,

    /// Content reads per session.
    #[arg(long, default_value_t = 250)]
    pub reads: usize,

    /// Print prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global entry budget shared by all tiers.
    pub capacity: CapacityConfig,

    /// Eviction policy tuning.
    pub eviction: EvictionConfig,

    /// Memory pressure monitor settings.
    pub pressure: PressureConfig,

    /// Expiry sweep settings.
    pub janitor: JanitorConfig,

    /// Size estimation settings.
    pub sizing: SizingConfig,
}

/// Entry-count budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Maximum entries across all tiers (MAX_CACHE_SIZE).
    pub max_entries: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self { max_entries: 100 }
    }
}

/// Eviction policy weights and fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Weight applied to the access count.
    pub frequency_weight: f64,

    /// Weight applied to the last-access recency (milliseconds).
    pub recency_weight: f64,

    /// Fraction of entries removed when the capacity budget is hit.
    pub capacity_fraction: f64,

    /// Fraction of entries removed under elevated memory pressure.
    pub aggressive_fraction: f64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            frequency_weight: 0.3,
            recency_weight: 0.7,
            capacity_fraction: 0.25,
            aggressive_fraction: 0.5,
        }
    }
}

/// Memory pressure monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Memory ceiling the estimated footprint is measured against.
    pub memory_ceiling_bytes: usize,

    /// Elevated pressure when footprint / ceiling exceeds this fraction.
    pub low_memory_threshold: f64,

    /// Seconds between monitor ticks.
    pub check_interval_secs: u64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            memory_ceiling_bytes: 50 * 1024 * 1024, // 50 MB
            low_memory_threshold: 0.7,
            check_interval_secs: 30,
        }
    }
}

/// Janitor (expiry sweep) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    /// Seconds between sweeps (CLEANUP_INTERVAL).
    pub cleanup_interval_secs: u64,

    /// Entries idle longer than this are removed (MAX_AGE).
    pub max_age_secs: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 5 * 60,
            max_age_secs: 15 * 60,
        }
    }
}

/// Size estimation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Size assumed for values that cannot be serialized.
    pub default_estimate_bytes: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            default_estimate_bytes: 1024,
        }
    }
}

impl PressureConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl JanitorConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject tunables the cache cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.pressure.memory_ceiling_bytes == 0 {
            return Err(ConfigError::ZeroMemoryCeiling);
        }
        if self.pressure.check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("pressure.check_interval_secs"));
        }
        if self.janitor.cleanup_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("janitor.cleanup_interval_secs"));
        }

        let fractions = [
            ("eviction.capacity_fraction", self.eviction.capacity_fraction),
            ("eviction.aggressive_fraction", self.eviction.aggressive_fraction),
            ("pressure.low_memory_threshold", self.pressure.low_memory_threshold),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::FractionOutOfRange { name, value });
            }
        }

        let weights = [
            ("eviction.frequency_weight", self.eviction.frequency_weight),
            ("eviction.recency_weight", self.eviction.recency_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        Ok(())
    }

    /// Memory ceiling expressed in megabytes.
    pub fn memory_ceiling_mb(&self) -> f64 {
        self.pressure.memory_ceiling_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.capacity.max_entries, 100);
        assert_eq!(cfg.eviction.frequency_weight, 0.3);
        assert_eq!(cfg.eviction.recency_weight, 0.7);
        assert_eq!(cfg.pressure.low_memory_threshold, 0.7);
        assert_eq!(cfg.janitor.cleanup_interval(), Duration::from_secs(300));
        assert_eq!(cfg.janitor.max_age(), Duration::from_secs(900));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut cfg = Config::default();
        cfg.capacity.max_entries = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let mut cfg = Config::default();
        cfg.eviction.aggressive_fraction = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FractionOutOfRange { name: "eviction.aggressive_fraction", .. })
        ));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "capacity": {{ "max_entries": 30 }} }}"#).unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.capacity.max_entries, 30);
        // Unspecified sections keep their defaults.
        assert_eq!(cfg.janitor.max_age_secs, 900);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = Config::load(std::path::Path::new("/nonexistent/scripture-cache.json")).unwrap();
        assert_eq!(cfg.capacity.max_entries, 100);
    }
}
