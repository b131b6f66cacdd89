//! Cache manager and its shared-instance lifecycle.
//!
//! [`CacheManager`] owns the tier store and the two background tasks. It is
//! the only surface callers touch, and none of its operations can fail: any
//! internal fault degrades to a miss or a skipped step.
//!
//! [`CacheRegistry`] is the explicit context object the application creates
//! once and hands to every consumer. It lazily builds one shared manager on
//! first use and tears it down on [`CacheRegistry::destroy`], after which the
//! next [`CacheRegistry::get_instance`] builds a fresh, empty one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::entry::{PressureState, Tier};
use crate::cache::janitor::{JanitorScheduler, MemoryReclaimer};
use crate::cache::pressure::{MemoryPressureMonitor, PressureReport};
use crate::cache::store::{new_shared_store, CacheStats, PutOutcome, SharedStore};
use crate::config::Config;
use crate::content::Content;
use crate::error::SetupError;
use crate::metrics::{CacheMetrics, SkipReason};

pub struct CacheManager {
    store: SharedStore,
    janitor: JanitorScheduler,
    monitor: MemoryPressureMonitor,
    metrics: Arc<CacheMetrics>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Set once by `shutdown`; the manager stores and serves nothing afterwards.
    stopped: AtomicBool,
}

impl CacheManager {
    /// Build a manager and start its janitor and pressure monitor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &Config,
        metrics: Arc<CacheMetrics>,
        reclaimer: Option<Arc<dyn MemoryReclaimer>>,
    ) -> Self {
        let store = new_shared_store(config, metrics.clone());
        let janitor = JanitorScheduler::new(store.clone(), &config.janitor, reclaimer);
        let monitor = MemoryPressureMonitor::new(store.clone(), &config.pressure);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            janitor.clone().spawn(shutdown_rx.clone()),
            monitor.clone().spawn(shutdown_rx),
        ];

        info!(
            max_entries = config.capacity.max_entries,
            memory_ceiling_mb = config.memory_ceiling_mb(),
            cleanup_interval_secs = config.janitor.cleanup_interval_secs,
            max_age_secs = config.janitor.max_age_secs,
            "Cache started"
        );

        Self {
            store,
            janitor,
            monitor,
            metrics,
            shutdown,
            tasks: Mutex::new(tasks),
            stopped: AtomicBool::new(false),
        }
    }

    /// Cache `value` under `key` in `tier`.
    pub async fn put(
        &self,
        tier: Tier,
        key: impl Into<String>,
        value: impl Into<Content>,
    ) -> PutOutcome {
        let mut store = self.store.write().await;
        if self.is_stopped() {
            self.metrics.record_skipped_put(SkipReason::Stopped);
            return PutOutcome::Stopped;
        }
        store.put(tier, key, value.into())
    }

    /// Cached value for `key` in `tier`, or `None` on a miss.
    pub async fn get(&self, tier: Tier, key: &str) -> Option<Content> {
        let mut store = self.store.write().await;
        if self.is_stopped() {
            return None;
        }
        store.get(tier, key)
    }

    /// Time since `key` was last read or written, without counting as an access.
    pub async fn entry_idle(&self, tier: Tier, key: &str) -> Option<Duration> {
        let store = self.store.read().await;
        store.entry(tier, key).map(|e| e.idle(tokio::time::Instant::now()))
    }

    /// Whether `shutdown` has run.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub async fn contains(&self, tier: Tier, key: &str) -> bool {
        self.store.read().await.contains(tier, key)
    }

    pub async fn remove(&self, tier: Tier, key: &str) -> bool {
        self.store.write().await.remove(tier, key)
    }

    pub async fn clear(&self, tier: Tier) {
        self.store.write().await.clear(tier);
    }

    pub async fn clear_all(&self) {
        self.store.write().await.clear_all();
    }

    /// Remove entries idle for longer than `max_age`, outside the regular schedule.
    pub async fn cleanup_old_items(&self, max_age: Duration) -> usize {
        self.janitor.cleanup_old_items(max_age).await
    }

    /// Flush everything and run the optional reclaim hook.
    pub async fn force_garbage_collection(&self) -> usize {
        self.janitor.force_garbage_collection().await
    }

    /// Run one janitor sweep now.
    pub async fn run_janitor_sweep(&self) -> usize {
        self.janitor.sweep().await
    }

    /// Run one pressure check now.
    pub async fn check_pressure(&self) -> PressureReport {
        self.monitor.tick().await
    }

    /// Evict `ceil(n × fraction)` entries by composite score.
    pub async fn evict_fraction(&self, fraction: f64) -> usize {
        self.store.write().await.evict_fraction(fraction)
    }

    /// Evict the least-used half of the cache.
    pub async fn aggressive_evict(&self) -> usize {
        self.store.write().await.aggressive_evict()
    }

    pub async fn pressure(&self) -> PressureState {
        self.store.read().await.pressure()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Stop both background tasks, wait for them, and empty the cache.
    ///
    /// Later puts are refused and gets miss. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
        self.shutdown.send_replace(true);

        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {e}");
            }
        }

        let mut store = self.store.write().await;
        store.clear_all();
        store.set_pressure(PressureState::Normal);
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Owner of the one shared [`CacheManager`].
pub struct CacheRegistry {
    config: Config,
    metrics: Arc<CacheMetrics>,
    reclaimer: Option<Arc<dyn MemoryReclaimer>>,
    instance: Mutex<Option<Arc<CacheManager>>>,
}

impl CacheRegistry {
    pub fn new(config: Config) -> Result<Self, SetupError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Arc::new(CacheMetrics::new()?),
            reclaimer: None,
            instance: Mutex::new(None),
        })
    }

    /// Install a reclaim hook for managers built from now on.
    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn MemoryReclaimer>) -> Self {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// The shared manager, built and started on first call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_instance(&self) -> Arc<CacheManager> {
        let mut slot = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(|| {
            Arc::new(CacheManager::start(
                &self.config,
                self.metrics.clone(),
                self.reclaimer.clone(),
            ))
        })
        .clone()
    }

    /// Whether a manager is currently live.
    pub fn is_active(&self) -> bool {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop and release the shared manager. A no-op if there is none.
    pub async fn destroy(&self) {
        let instance = self
            .instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(manager) = instance {
            manager.shutdown().await;
            info!("Cache destroyed");
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics shared by every manager this registry builds.
    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_instance_is_shared() {
        let registry = CacheRegistry::new(Config::default()).unwrap();
        let a = registry.get_instance();
        let b = registry.get_instance();
        assert!(Arc::ptr_eq(&a, &b));

        a.put(Tier::Passage, "GEN:1", "text-A").await;
        assert_eq!(b.get(Tier::Passage, "GEN:1").await, Some(Content::from("text-A")));

        registry.destroy().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_without_instance() {
        let registry = CacheRegistry::new(Config::default()).unwrap();
        assert!(!registry.is_active());
        registry.destroy().await;
        registry.destroy().await;
        assert!(!registry.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent() {
        let registry = CacheRegistry::new(Config::default()).unwrap();
        let manager = registry.get_instance();
        manager.put(Tier::Book, "KJV:GEN", "Genesis").await;

        manager.shutdown().await;
        manager.shutdown().await;
        assert!(manager.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_manager_refuses_puts_and_misses() {
        let registry = CacheRegistry::new(Config::default()).unwrap();
        let stale = registry.get_instance();
        stale.put(Tier::Passage, "GEN:1", "text-A").await;

        registry.destroy().await;
        assert!(stale.is_stopped());

        assert_eq!(
            stale.put(Tier::Passage, "GEN:1", "text-A").await,
            PutOutcome::Stopped
        );
        assert_eq!(stale.get(Tier::Passage, "GEN:1").await, None);

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert!(stale.store().read().await.is_empty());
        assert!(!stale.contains(Tier::Passage, "GEN:1").await);
    }

    #[test]
    fn test_registry_rejects_invalid_config() {
        let mut config = Config::default();
        config.pressure.memory_ceiling_bytes = 0;
        assert!(matches!(CacheRegistry::new(config), Err(SetupError::Config(_))));
    }
}
