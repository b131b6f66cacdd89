//! Tiered scripture content cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`entry`]: CacheEntry, Tier and PressureState definitions
//! - [`sizing`]: Footprint estimation for cached values
//! - [`evictor`]: Eviction policy (frequency + recency composite, and access-count only)
//! - [`store`]: Tier store that enforces the entry budget and applies eviction
//! - [`pressure`]: Memory pressure monitor
//! - [`janitor`]: Periodic expiry sweep and forced flush
//! - [`manager`]: Public cache surface and shared-instance lifecycle

pub mod entry;
pub mod evictor;
pub mod janitor;
pub mod manager;
pub mod pressure;
mod schedule;
pub mod sizing;
pub mod store;
