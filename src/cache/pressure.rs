//! Memory pressure monitor.
//!
//! Every tick re-measures the estimated footprint of all live entries and
//! compares it against the configured ceiling. Above the low-memory threshold
//! the cache flips to [`PressureState::Elevated`], immediately evicts the
//! least-used half, and stops admitting new entries until a later tick
//! measures a footprint back under the threshold.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::entry::PressureState;
use crate::cache::schedule::spawn_periodic;
use crate::cache::store::SharedStore;
use crate::config::PressureConfig;

/// Outcome of a single monitor tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReport {
    pub state: PressureState,
    /// Footprint / ceiling, or `None` if the footprint could not be measured.
    pub fraction: Option<f64>,
    pub evicted: usize,
}

#[derive(Clone)]
pub struct MemoryPressureMonitor {
    store: SharedStore,
    ceiling_bytes: usize,
    threshold: f64,
    interval: Duration,
}

impl MemoryPressureMonitor {
    pub fn new(store: SharedStore, config: &PressureConfig) -> Self {
        Self {
            store,
            ceiling_bytes: config.memory_ceiling_bytes,
            threshold: config.low_memory_threshold,
            interval: config.check_interval(),
        }
    }

    /// Measure once and update the pressure state.
    ///
    /// A failed measurement is logged and leaves the state as it was.
    pub async fn tick(&self) -> PressureReport {
        let mut store = self.store.write().await;
        let previous = store.pressure();

        let footprint = match store.measure_footprint() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Pressure check skipped: {e}");
                return PressureReport {
                    state: previous,
                    fraction: None,
                    evicted: 0,
                };
            }
        };

        let fraction = if self.ceiling_bytes == 0 {
            0.0
        } else {
            footprint as f64 / self.ceiling_bytes as f64
        };
        let state = PressureState::from_fraction(fraction, self.threshold);

        if state != previous {
            info!(from = %previous, to = %state, fraction, footprint, "Memory pressure changed");
        } else {
            debug!(state = %state, fraction, footprint, "Memory pressure checked");
        }
        store.set_pressure(state);

        let evicted = if state.is_elevated() {
            store.aggressive_evict()
        } else {
            0
        };

        PressureReport {
            state,
            fraction: Some(fraction),
            evicted,
        }
    }

    /// Start ticking in the background until `shutdown` fires.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let interval = self.interval;
        spawn_periodic("pressure-monitor", interval, shutdown, move || {
            let monitor = self.clone();
            async move {
                monitor.tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::entry::Tier;
    use crate::cache::store::new_shared_store;
    use crate::config::Config;
    use crate::content::Content;
    use crate::metrics::CacheMetrics;

    fn setup(ceiling_bytes: usize) -> (SharedStore, MemoryPressureMonitor) {
        let mut config = Config::default();
        config.pressure.memory_ceiling_bytes = ceiling_bytes;
        let store = new_shared_store(&config, Arc::new(CacheMetrics::new().unwrap()));
        let monitor = MemoryPressureMonitor::new(store.clone(), &config.pressure);
        (store, monitor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_below_threshold() {
        let (store, monitor) = setup(1_000_000);
        store.write().await.put(Tier::Passage, "a", Content::from("small"));

        let report = monitor.tick().await;
        assert_eq!(report.state, PressureState::Normal);
        assert_eq!(report.evicted, 0);
        assert_eq!(store.read().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elevated_evicts_half() {
        let (store, monitor) = setup(1_000);
        {
            let mut store = store.write().await;
            for i in 0..10 {
                store.put(Tier::Chapter, format!("c{i}"), Content::from("x".repeat(100)));
            }
            assert!(store.total_bytes() > 700);
        }

        let report = monitor.tick().await;
        assert_eq!(report.state, PressureState::Elevated);
        assert_eq!(report.evicted, 5);

        let store = store.read().await;
        assert_eq!(store.len(), 5);
        assert!(store.pressure().is_elevated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_to_normal() {
        let (store, monitor) = setup(1_000);
        store.write().await.set_pressure(PressureState::Elevated);

        let report = monitor.tick().await;
        assert_eq!(report.state, PressureState::Normal);
        assert!(!store.read().await.pressure().is_elevated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmeasurable_footprint_keeps_state() {
        let (store, monitor) = setup(1_000);
        {
            let mut store = store.write().await;
            for key in ["a", "b"] {
                store.put(Tier::Book, key, Content::from("x"));
                if let Some(entry) = store.entry_mut(Tier::Book, key) {
                    entry.size_bytes = usize::MAX / 2 + 1;
                }
            }
            assert!(store.measure_footprint().is_err());
            store.set_pressure(PressureState::Elevated);
        }

        let report = monitor.tick().await;
        assert_eq!(report.state, PressureState::Elevated);
        assert_eq!(report.fraction, None);
        assert_eq!(report.evicted, 0);

        let store = store.read().await;
        assert_eq!(store.len(), 2);
        assert!(store.pressure().is_elevated());
    }
}
