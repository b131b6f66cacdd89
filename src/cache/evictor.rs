//! Eviction policy: decides which entries to drop.
//!
//! Two rankings are used:
//! - Capacity eviction ranks by a composite score combining access frequency
//!   and last-access recency. Lowest score goes first.
//! - Aggressive (pressure) eviction ranks by access count alone, which is
//!   cheaper and good enough when memory has to be released right now.
//!
//! Ties are broken by insertion sequence so the victim set is deterministic.

use std::cmp::Ordering;

use tokio::time::Instant;

use crate::cache::entry::{CacheEntry, Tier};
use crate::config::EvictionConfig;

/// An eviction candidate with its computed score.
#[derive(Debug, Clone)]
pub struct EvictionCandidate {
    pub tier: Tier,
    pub key: String,
    pub score: f64,
    pub seq: u64,
}

impl EvictionCandidate {
    // Lower score = evicted first; equal scores fall back to insertion order.
    fn rank(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Number of victims for `fraction` of `candidates`, i.e. `ceil(candidates * fraction)`.
pub fn victim_count(candidates: usize, fraction: f64) -> usize {
    if candidates == 0 || fraction <= 0.0 {
        return 0;
    }
    let wanted = (candidates as f64 * fraction.min(1.0)).ceil() as usize;
    wanted.min(candidates)
}

/// The eviction policy engine.
#[derive(Debug, Clone)]
pub struct Evictor {
    config: EvictionConfig,
}

impl Evictor {
    pub fn new(config: EvictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    /// Compute the composite score for a single entry.
    ///
    /// ```text
    /// score(entry) =
    ///     w_freq    × access_count +
    ///     w_recency × (last_access − epoch) in milliseconds
    /// ```
    ///
    /// The recency term is not normalized against the count, so for entries
    /// whose last access is far apart it dominates the ranking.
    pub fn compute_score(&self, entry: &CacheEntry, epoch: Instant) -> f64 {
        let recency_ms = entry.last_access.saturating_duration_since(epoch).as_secs_f64() * 1000.0;

        self.config.frequency_weight * entry.access_count as f64
            + self.config.recency_weight * recency_ms
    }

    /// Select `ceil(n × fraction)` entries with the lowest composite score.
    pub fn select_victims<'a>(
        &self,
        entries: impl Iterator<Item = (Tier, &'a String, &'a CacheEntry)>,
        fraction: f64,
        epoch: Instant,
    ) -> Vec<EvictionCandidate> {
        let candidates = entries
            .map(|(tier, key, entry)| EvictionCandidate {
                tier,
                key: key.clone(),
                score: self.compute_score(entry, epoch),
                seq: entry.seq,
            })
            .collect();

        lowest(candidates, fraction)
    }

    /// Select `ceil(n × aggressive_fraction)` entries with the fewest hits.
    ///
    /// Recency is ignored.
    pub fn select_aggressive<'a>(
        &self,
        entries: impl Iterator<Item = (Tier, &'a String, &'a CacheEntry)>,
    ) -> Vec<EvictionCandidate> {
        let candidates = entries
            .map(|(tier, key, entry)| EvictionCandidate {
                tier,
                key: key.clone(),
                score: entry.access_count as f64,
                seq: entry.seq,
            })
            .collect();

        lowest(candidates, self.config.aggressive_fraction)
    }
}

fn lowest(mut candidates: Vec<EvictionCandidate>, fraction: f64) -> Vec<EvictionCandidate> {
    let count = victim_count(candidates.len(), fraction);
    if count == 0 {
        return Vec::new();
    }
    candidates.sort_by(EvictionCandidate::rank);
    candidates.truncate(count);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;
    use std::time::Duration;

    fn make_entry(seq: u64, hits: u64, last_access: Instant) -> CacheEntry {
        let mut entry = CacheEntry::new(Content::from("text"), 6, seq, last_access);
        entry.access_count = hits;
        entry
    }

    #[test]
    fn test_victim_count_rounds_up() {
        assert_eq!(victim_count(30, 0.25), 8);
        assert_eq!(victim_count(10, 0.5), 5);
        assert_eq!(victim_count(1, 0.25), 1);
        assert_eq!(victim_count(0, 0.25), 0);
        assert_eq!(victim_count(4, 2.0), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_prefers_cold_rarely_used() {
        let evictor = Evictor::new(EvictionConfig::default());
        let epoch = Instant::now();

        let old = make_entry(0, 1, epoch);
        tokio::time::advance(Duration::from_millis(100)).await;
        let fresh = make_entry(1, 1, Instant::now());
        let popular = make_entry(2, 50, epoch);

        let keys: Vec<String> = vec!["old".into(), "fresh".into(), "popular".into()];
        let entries = [&old, &fresh, &popular];
        let victims = evictor.select_victims(
            keys.iter().zip(entries).map(|(k, e)| (Tier::Passage, k, e)),
            0.25,
            epoch,
        );

        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].key, "old");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_break_by_insertion_order() {
        let evictor = Evictor::new(EvictionConfig::default());
        let now = Instant::now();

        let a = make_entry(7, 0, now);
        let b = make_entry(3, 0, now);
        let keys: Vec<String> = vec!["a".into(), "b".into()];
        let victims = evictor.select_victims(
            keys.iter().zip([&a, &b]).map(|(k, e)| (Tier::Chapter, k, e)),
            0.5,
            now,
        );

        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].key, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggressive_ignores_recency() {
        let evictor = Evictor::new(EvictionConfig::default());
        let epoch = Instant::now();

        let stale_popular = make_entry(0, 9, epoch);
        tokio::time::advance(Duration::from_secs(60)).await;
        let fresh_unused = make_entry(1, 0, Instant::now());

        let keys: Vec<String> = vec!["stale".into(), "fresh".into()];
        let victims = evictor.select_aggressive(
            keys.iter()
                .zip([&stale_popular, &fresh_unused])
                .map(|(k, e)| (Tier::Book, k, e)),
        );

        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].key, "fresh");
    }
}
