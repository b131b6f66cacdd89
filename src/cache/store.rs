//! Tier store: the three content partitions and their shared entry budget.
//!
//! The store is the single owner of every cached entry. It:
//! - Enforces the global entry budget before an insertion would exceed it
//! - Refuses new content while memory pressure is elevated
//! - Maintains per-tier usage accounting
//! - Applies the eviction policy and expiry sweeps on request

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::entry::{CacheEntry, PressureState, Tier};
use crate::cache::evictor::{EvictionCandidate, Evictor};
use crate::cache::sizing::SizeEstimator;
use crate::config::Config;
use crate::content::Content;
use crate::error::CacheError;
use crate::metrics::{CacheMetrics, EvictionReason, SkipReason};

/// What a put did. Informational only; a put never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new entry was stored.
    Inserted,
    /// An existing entry was overwritten and its stats reset.
    Replaced,
    /// Memory pressure is elevated; nothing was stored.
    SkippedUnderPressure,
    /// The key was empty; nothing was stored.
    EmptyKey,
    /// The cache has been shut down; nothing was stored.
    Stopped,
}

impl PutOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PutOutcome::Inserted | PutOutcome::Replaced)
    }
}

/// Per-tier usage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStats {
    /// Number of entries in this tier.
    pub entry_count: usize,
    /// Estimated bytes held by this tier.
    pub bytes_used: usize,
}

/// Snapshot of the whole cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub total_size_bytes: usize,
    pub memory_usage_mb: f64,
    /// Unix milliseconds of the oldest insertion still resident.
    pub oldest_entry_timestamp: Option<u64>,
    /// Unix milliseconds of the newest insertion still resident.
    pub newest_entry_timestamp: Option<u64>,
    pub pressure: PressureState,
    pub tiers: HashMap<Tier, TierStats>,
    pub hits: u64,
    pub misses: u64,
}

/// The central entry store.
pub struct TierStore {
    /// Entries indexed by tier, then key.
    tiers: HashMap<Tier, HashMap<String, CacheEntry>>,

    /// Per-tier statistics.
    tier_stats: HashMap<Tier, TierStats>,

    /// Eviction policy.
    evictor: Evictor,

    /// Footprint estimator.
    sizer: SizeEstimator,

    /// Global entry budget.
    max_entries: usize,

    /// Current pressure state, owned by the pressure monitor.
    pressure: PressureState,

    /// Reference point for the recency term of the eviction score.
    epoch: Instant,

    /// Next insertion sequence number.
    next_seq: u64,

    metrics: Arc<CacheMetrics>,
}

impl TierStore {
    pub fn new(config: &Config, metrics: Arc<CacheMetrics>) -> Self {
        let tiers = Tier::ALL.into_iter().map(|t| (t, HashMap::new())).collect();
        let tier_stats = Tier::ALL.into_iter().map(|t| (t, TierStats::default())).collect();

        Self {
            tiers,
            tier_stats,
            evictor: Evictor::new(config.eviction.clone()),
            sizer: SizeEstimator::new(config.sizing.default_estimate_bytes),
            max_entries: config.capacity.max_entries,
            pressure: PressureState::Normal,
            epoch: Instant::now(),
            next_seq: 0,
            metrics,
        }
    }

    fn partition(&self, tier: Tier) -> Option<&HashMap<String, CacheEntry>> {
        self.tiers.get(&tier)
    }

    /// Insert or overwrite `key` in `tier`.
    ///
    /// New keys are only admitted while pressure is normal; if the entry
    /// budget is already full, a fraction of the lowest-scoring entries is
    /// evicted first.
    pub fn put(&mut self, tier: Tier, key: impl Into<String>, value: Content) -> PutOutcome {
        let key = key.into();
        if key.is_empty() {
            debug!(tier = %tier, "Ignoring put with empty key");
            self.metrics.record_skipped_put(SkipReason::EmptyKey);
            return PutOutcome::EmptyKey;
        }

        let size_bytes = self.sizer.estimate(&value);

        if self.pressure.is_elevated() {
            debug!(tier = %tier, key = %key, "Memory pressure elevated, not caching");
            self.metrics.record_skipped_put(SkipReason::Pressure);
            return PutOutcome::SkippedUnderPressure;
        }

        let replacing = self.contains(tier, &key);
        if !replacing && self.len() >= self.max_entries {
            let fraction = self.evictor.config().capacity_fraction;
            self.evict_fraction(fraction);
        }

        let now = Instant::now();
        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = CacheEntry::new(value, size_bytes, seq, now);
        let previous = self
            .tiers
            .entry(tier)
            .or_default()
            .insert(key, entry);

        let stats = self.tier_stats.entry(tier).or_default();
        if let Some(old) = &previous {
            stats.bytes_used = stats.bytes_used.saturating_sub(old.size_bytes);
        } else {
            stats.entry_count += 1;
        }
        stats.bytes_used += size_bytes;
        self.publish_resident();

        if previous.is_some() {
            PutOutcome::Replaced
        } else {
            PutOutcome::Inserted
        }
    }

    /// Look up `key`, recording the access on a hit.
    pub fn get(&mut self, tier: Tier, key: &str) -> Option<Content> {
        let now = Instant::now();
        match self.tiers.get_mut(&tier).and_then(|m| m.get_mut(key)) {
            Some(entry) => {
                entry.touch(now);
                self.metrics.record_hit(tier);
                Some(entry.value.clone())
            }
            None => {
                self.metrics.record_miss(tier);
                None
            }
        }
    }

    /// Presence check that does not count as an access.
    pub fn contains(&self, tier: Tier, key: &str) -> bool {
        self.partition(tier).is_some_and(|m| m.contains_key(key))
    }

    /// Remove a single entry. Returns whether it was present.
    pub fn remove(&mut self, tier: Tier, key: &str) -> bool {
        let removed = self.take(tier, key).is_some();
        if removed {
            self.metrics.record_evictions(EvictionReason::Explicit, 1);
            self.publish_resident();
        }
        removed
    }

    fn take(&mut self, tier: Tier, key: &str) -> Option<CacheEntry> {
        let entry = self.tiers.get_mut(&tier)?.remove(key)?;
        if let Some(stats) = self.tier_stats.get_mut(&tier) {
            stats.entry_count = stats.entry_count.saturating_sub(1);
            stats.bytes_used = stats.bytes_used.saturating_sub(entry.size_bytes);
        }
        Some(entry)
    }

    /// Remove every entry in `tier`. Returns the number removed.
    pub fn clear(&mut self, tier: Tier) -> usize {
        let removed = self.tiers.get_mut(&tier).map_or(0, |m| {
            let n = m.len();
            m.clear();
            n
        });
        self.tier_stats.insert(tier, TierStats::default());
        self.publish_resident();
        removed
    }

    /// Remove every entry in every tier. Returns the number removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = Tier::ALL.into_iter().map(|t| self.clear(t)).sum();
        if removed > 0 {
            info!(removed, "Cache cleared");
        }
        removed
    }

    fn iter_entries(&self) -> impl Iterator<Item = (Tier, &String, &CacheEntry)> {
        Tier::ALL
            .into_iter()
            .filter_map(|t| self.tiers.get(&t).map(|m| (t, m)))
            .flat_map(|(tier, m)| m.iter().map(move |(k, e)| (tier, k, e)))
    }

    fn remove_victims(&mut self, victims: Vec<EvictionCandidate>, reason: EvictionReason) -> usize {
        let mut evicted = 0;
        for victim in victims {
            if self.take(victim.tier, &victim.key).is_some() {
                evicted += 1;
                debug!(
                    tier = %victim.tier,
                    key = %victim.key,
                    score = victim.score,
                    reason = reason.as_str(),
                    "Evicted entry"
                );
            }
        }
        self.metrics.record_evictions(reason, evicted);
        self.publish_resident();
        evicted
    }

    /// Evict `ceil(n × fraction)` entries with the lowest composite score.
    ///
    /// Returns the number of entries evicted.
    pub fn evict_fraction(&mut self, fraction: f64) -> usize {
        let victims = self
            .evictor
            .select_victims(self.iter_entries(), fraction, self.epoch);
        let evicted = self.remove_victims(victims, EvictionReason::Capacity);

        if evicted > 0 {
            info!(evicted, remaining = self.len(), "Capacity eviction complete");
        }
        evicted
    }

    /// Evict the least-used half of the cache (pressure response).
    ///
    /// Returns the number of entries evicted.
    pub fn aggressive_evict(&mut self) -> usize {
        let victims = self.evictor.select_aggressive(self.iter_entries());
        let evicted = self.remove_victims(victims, EvictionReason::Pressure);

        if evicted > 0 {
            info!(evicted, remaining = self.len(), "Aggressive eviction complete");
        }
        evicted
    }

    /// Remove entries idle for longer than `max_age`. Returns the number removed.
    pub fn cleanup_old_items(&mut self, max_age: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(Tier, String)> = self
            .iter_entries()
            .filter(|(_, _, e)| e.idle(now) > max_age)
            .map(|(t, k, _)| (t, k.clone()))
            .collect();

        let mut removed = 0;
        for (tier, key) in expired {
            if self.take(tier, &key).is_some() {
                removed += 1;
            }
        }
        self.metrics.record_evictions(EvictionReason::Expired, removed);
        self.publish_resident();
        removed
    }

    /// Recompute the estimated footprint from the live entries.
    pub fn measure_footprint(&self) -> Result<usize, CacheError> {
        let mut total: usize = 0;
        for (_, _, entry) in self.iter_entries() {
            total = total
                .checked_add(entry.size_bytes)
                .ok_or(CacheError::SizeOverflow { entries: self.len() })?;
        }
        Ok(total)
    }

    pub fn pressure(&self) -> PressureState {
        self.pressure
    }

    pub fn set_pressure(&mut self, state: PressureState) {
        self.pressure = state;
        self.metrics.set_pressure(state);
    }

    /// Total number of entries across all tiers.
    pub fn len(&self) -> usize {
        self.tiers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get tier statistics for monitoring.
    pub fn tier_stats(&self) -> &HashMap<Tier, TierStats> {
        &self.tier_stats
    }

    /// Bookkept total bytes across tiers.
    pub fn total_bytes(&self) -> usize {
        self.tier_stats.values().map(|s| s.bytes_used).sum()
    }

    /// Access statistics for a single entry, without counting as an access.
    pub fn entry(&self, tier: Tier, key: &str) -> Option<&CacheEntry> {
        self.partition(tier)?.get(key)
    }

    #[cfg(test)]
    pub(crate) fn entry_mut(&mut self, tier: Tier, key: &str) -> Option<&mut CacheEntry> {
        self.tiers.get_mut(&tier)?.get_mut(key)
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Snapshot statistics for the whole cache.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let wall_now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let to_wall = |at: Instant| {
            let age_ms = now.saturating_duration_since(at).as_millis() as u64;
            wall_now_ms.saturating_sub(age_ms)
        };

        let oldest = self.iter_entries().map(|(_, _, e)| e.inserted_at).min();
        let newest = self.iter_entries().map(|(_, _, e)| e.inserted_at).max();
        let total_size_bytes = self.total_bytes();

        CacheStats {
            total_items: self.len(),
            total_size_bytes,
            memory_usage_mb: total_size_bytes as f64 / (1024.0 * 1024.0),
            oldest_entry_timestamp: oldest.map(to_wall),
            newest_entry_timestamp: newest.map(to_wall),
            pressure: self.pressure,
            tiers: self.tier_stats.clone(),
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
        }
    }

    fn publish_resident(&self) {
        self.metrics.set_resident(self.len(), self.total_bytes());
    }
}

/// Thread-safe wrapper around the store, shared with the background tasks.
pub type SharedStore = Arc<RwLock<TierStore>>;

/// Create a new thread-safe store.
pub fn new_shared_store(config: &Config, metrics: Arc<CacheMetrics>) -> SharedStore {
    Arc::new(RwLock::new(TierStore::new(config, metrics)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(max_entries: usize) -> TierStore {
        let mut config = Config::default();
        config.capacity.max_entries = max_entries;
        TierStore::new(&config, Arc::new(CacheMetrics::new().unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_insert_and_stats() {
        let mut store = test_store(10);

        assert_eq!(
            store.put(Tier::Passage, "GEN:1", Content::from("text-A")),
            PutOutcome::Inserted
        );

        let stats = store.tier_stats().get(&Tier::Passage).unwrap();
        assert_eq!(stats.entry_count, 1);
        assert!(stats.bytes_used > 0);
        assert_eq!(store.total_bytes(), store.measure_footprint().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_stats() {
        let mut store = test_store(10);
        store.put(Tier::Chapter, "GEN:1", Content::from("v1"));
        store.get(Tier::Chapter, "GEN:1");
        store.get(Tier::Chapter, "GEN:1");
        assert_eq!(store.entry(Tier::Chapter, "GEN:1").unwrap().access_count, 2);

        assert_eq!(store.put(Tier::Chapter, "GEN:1", Content::from("v2")), PutOutcome::Replaced);
        let entry = store.entry(Tier::Chapter, "GEN:1").unwrap();
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.value, Content::from("v2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.tier_stats()[&Tier::Chapter].entry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiers_are_independent() {
        let mut store = test_store(10);
        store.put(Tier::Passage, "GEN:1", Content::from("passage"));
        store.put(Tier::Chapter, "GEN:1", Content::from("chapter"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(Tier::Passage, "GEN:1"), Some(Content::from("passage")));
        assert_eq!(store.get(Tier::Chapter, "GEN:1"), Some(Content::from("chapter")));
        assert_eq!(store.get(Tier::Book, "GEN:1"), None);

        assert_eq!(store.clear(Tier::Passage), 1);
        assert!(!store.contains(Tier::Passage, "GEN:1"));
        assert!(store.contains(Tier::Chapter, "GEN:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_key_is_ignored() {
        let mut store = test_store(10);
        assert_eq!(store.put(Tier::Book, "", Content::from("x")), PutOutcome::EmptyKey);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_skipped_under_pressure() {
        let mut store = test_store(10);
        store.set_pressure(PressureState::Elevated);

        let outcome = store.put(Tier::Passage, "JHN:3", Content::from("For God so loved"));
        assert_eq!(outcome, PutOutcome::SkippedUnderPressure);
        assert!(!outcome.is_stored());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_enforced_before_insert() {
        let mut store = test_store(4);
        for i in 0..4 {
            store.put(Tier::Passage, format!("k{i}"), Content::from("v"));
        }
        assert_eq!(store.len(), 4);

        // ceil(4 × 0.25) = 1 evicted, then the new key lands.
        store.put(Tier::Passage, "k4", Content::from("v"));
        assert_eq!(store.len(), 4);
        assert!(store.contains(Tier::Passage, "k4"));
        assert!(!store.contains(Tier::Passage, "k0"));

        // Overwriting at capacity does not evict.
        store.put(Tier::Passage, "k4", Content::from("v2"));
        assert_eq!(store.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_single_entry() {
        let mut store = test_store(10);
        store.put(Tier::Book, "KJV:RUT", Content::from("Ruth"));
        assert!(store.remove(Tier::Book, "KJV:RUT"));
        assert!(!store.remove(Tier::Book, "KJV:RUT"));
        assert_eq!(store.total_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_timestamps() {
        let mut store = test_store(10);
        let empty = store.stats();
        assert_eq!(empty.total_items, 0);
        assert!(empty.oldest_entry_timestamp.is_none());

        store.put(Tier::Passage, "a", Content::from("a"));
        tokio::time::advance(Duration::from_secs(10)).await;
        store.put(Tier::Passage, "b", Content::from("b"));

        let stats = store.stats();
        assert_eq!(stats.total_items, 2);
        let oldest = stats.oldest_entry_timestamp.unwrap();
        let newest = stats.newest_entry_timestamp.unwrap();
        assert!(newest >= oldest + 9_000);
    }
}
