//! Prometheus metrics for the cache.
//!
//! Each [`CacheMetrics`] owns its own registry so several caches (and tests)
//! can coexist in one process without colliding on metric names.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::cache::entry::{PressureState, Tier};

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Capacity,
    Pressure,
    Expired,
    Explicit,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Capacity => "capacity",
            EvictionReason::Pressure => "pressure",
            EvictionReason::Expired => "expired",
            EvictionReason::Explicit => "explicit",
        }
    }
}

/// Why a put did not store anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Pressure,
    EmptyKey,
    Stopped,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Pressure => "pressure",
            SkipReason::EmptyKey => "empty_key",
            SkipReason::Stopped => "stopped",
        }
    }
}

pub struct CacheMetrics {
    registry: Registry,
    hits: IntCounterVec,
    misses: IntCounterVec,
    evictions: IntCounterVec,
    skipped_puts: IntCounterVec,
    entries: IntGauge,
    bytes: IntGauge,
    pressure_elevated: IntGauge,
}

impl CacheMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("scripture_cache".to_string()), None)?;

        let hits = IntCounterVec::new(Opts::new("hits_total", "Cache hits by tier"), &["tier"])?;
        let misses =
            IntCounterVec::new(Opts::new("misses_total", "Cache misses by tier"), &["tier"])?;
        let evictions = IntCounterVec::new(
            Opts::new("evictions_total", "Entries removed by reason"),
            &["reason"],
        )?;
        let skipped_puts = IntCounterVec::new(
            Opts::new("puts_skipped_total", "Puts that stored nothing, by reason"),
            &["reason"],
        )?;
        let entries = IntGauge::new("entries", "Resident entries across all tiers")?;
        let bytes = IntGauge::new("bytes", "Estimated resident bytes across all tiers")?;
        let pressure_elevated =
            IntGauge::new("pressure_elevated", "1 while memory pressure is elevated")?;

        registry.register(Box::new(hits.clone()))?;
        registry.register(Box::new(misses.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(skipped_puts.clone()))?;
        registry.register(Box::new(entries.clone()))?;
        registry.register(Box::new(bytes.clone()))?;
        registry.register(Box::new(pressure_elevated.clone()))?;

        Ok(Self {
            registry,
            hits,
            misses,
            evictions,
            skipped_puts,
            entries,
            bytes,
            pressure_elevated,
        })
    }

    pub fn record_hit(&self, tier: Tier) {
        self.hits.with_label_values(&[tier.as_str()]).inc();
    }

    pub fn record_miss(&self, tier: Tier) {
        self.misses.with_label_values(&[tier.as_str()]).inc();
    }

    pub fn record_evictions(&self, reason: EvictionReason, count: usize) {
        if count > 0 {
            self.evictions
                .with_label_values(&[reason.as_str()])
                .inc_by(count as u64);
        }
    }

    pub fn record_skipped_put(&self, reason: SkipReason) {
        self.skipped_puts.with_label_values(&[reason.as_str()]).inc();
    }

    pub fn set_resident(&self, entries: usize, bytes: usize) {
        self.entries.set(entries as i64);
        self.bytes.set(bytes as i64);
    }

    pub fn set_pressure(&self, state: PressureState) {
        self.pressure_elevated.set(i64::from(state.is_elevated()));
    }

    pub fn hits(&self) -> u64 {
        Tier::ALL
            .iter()
            .map(|t| self.hits.with_label_values(&[t.as_str()]).get())
            .sum()
    }

    pub fn misses(&self) -> u64 {
        Tier::ALL
            .iter()
            .map(|t| self.misses.with_label_values(&[t.as_str()]).get())
            .sum()
    }

    pub fn evictions(&self, reason: EvictionReason) -> u64 {
        self.evictions.with_label_values(&[reason.as_str()]).get()
    }

    /// Render all metrics in the prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for CacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMetrics")
            .field("entries", &self.entries.get())
            .field("bytes", &self.bytes.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_render() {
        let metrics = CacheMetrics::new().unwrap();
        metrics.record_hit(Tier::Passage);
        metrics.record_hit(Tier::Book);
        metrics.record_miss(Tier::Chapter);
        metrics.record_evictions(EvictionReason::Capacity, 3);
        metrics.set_pressure(PressureState::Elevated);

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.evictions(EvictionReason::Capacity), 3);

        let text = metrics.render();
        assert!(text.contains("scripture_cache_hits_total"));
        assert!(text.contains("scripture_cache_pressure_elevated 1"));
    }
}
