//! Cache entry, tier and pressure-state types.
//!
//! An entry is the unit of eviction: it is inserted on a miss-then-put,
//! refreshed by hits, and removed whole by expiry, eviction or clearing.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::content::Content;

/// Identifies which partition an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Verse passages (small, most numerous).
    Passage,
    /// Whole chapters.
    Chapter,
    /// Whole books (large, few).
    Book,
}

impl Tier {
    /// All tiers, in a fixed iteration order.
    pub const ALL: [Tier; 3] = [Tier::Passage, Tier::Chapter, Tier::Book];

    /// Label used for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Passage => "passage",
            Tier::Chapter => "chapter",
            Tier::Book => "book",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the estimated footprint is above the low-memory threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureState {
    #[default]
    Normal,
    Elevated,
}

impl PressureState {
    /// Classify a footprint/ceiling ratio against the threshold.
    pub fn from_fraction(fraction: f64, threshold: f64) -> Self {
        if fraction > threshold {
            PressureState::Elevated
        } else {
            PressureState::Normal
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, PressureState::Elevated)
    }
}

impl std::fmt::Display for PressureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PressureState::Normal => write!(f, "normal"),
            PressureState::Elevated => write!(f, "elevated"),
        }
    }
}

/// A single cached value plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached content.
    pub value: Content,

    /// When the entry was inserted (or last overwritten).
    pub inserted_at: Instant,

    /// Timestamp of last access.
    pub last_access: Instant,

    /// Number of hits since insertion.
    pub access_count: u64,

    /// Estimated footprint in bytes.
    pub size_bytes: usize,

    /// Store-wide insertion sequence, used to break score ties.
    pub seq: u64,
}

impl CacheEntry {
    pub fn new(value: Content, size_bytes: usize, seq: u64, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_access: now,
            access_count: 0,
            size_bytes,
            seq,
        }
    }

    /// Record an access, updating timestamp and counter.
    pub fn touch(&mut self, now: Instant) {
        self.last_access = now;
        self.access_count += 1;
    }

    /// Time since last access.
    pub fn idle(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_access)
    }
}
