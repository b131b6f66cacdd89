//! scripture-cache: adaptive, tiered, pressure-aware in-memory cache.
//!
//! Keeps recently read scripture content resident so the reading UI does not
//! re-fetch or re-parse it, while bounding memory on constrained devices:
//!   passages / chapters / books → one shared entry budget → pressure-aware admission
//!
//! Everything is transient. Nothing is persisted and nothing survives
//! [`CacheRegistry::destroy`](cache::manager::CacheRegistry::destroy).

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod metrics;

pub use cache::entry::{PressureState, Tier};
pub use cache::janitor::MemoryReclaimer;
pub use cache::manager::{CacheManager, CacheRegistry};
pub use cache::store::{CacheStats, PutOutcome};
pub use config::Config;
pub use content::Content;
