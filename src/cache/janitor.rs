//! Janitor: periodic expiry sweep plus manual cleanup entry points.
//!
//! The sweep removes every entry idle for longer than the configured maximum
//! age, regardless of how often it was hit and regardless of capacity or
//! pressure state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::schedule::spawn_periodic;
use crate::cache::store::SharedStore;
use crate::config::JanitorConfig;

/// Optional hook the embedding runtime can provide to release memory after
/// a full cache flush (e.g. trimming an allocator arena).
pub trait MemoryReclaimer: Send + Sync {
    fn reclaim(&self);
}

#[derive(Clone)]
pub struct JanitorScheduler {
    store: SharedStore,
    max_age: Duration,
    interval: Duration,
    reclaimer: Option<Arc<dyn MemoryReclaimer>>,
}

impl JanitorScheduler {
    pub fn new(
        store: SharedStore,
        config: &JanitorConfig,
        reclaimer: Option<Arc<dyn MemoryReclaimer>>,
    ) -> Self {
        Self {
            store,
            max_age: config.max_age(),
            interval: config.cleanup_interval(),
            reclaimer,
        }
    }

    /// One scheduled sweep using the configured maximum age.
    pub async fn sweep(&self) -> usize {
        let removed = self.cleanup_old_items(self.max_age).await;
        if removed > 0 {
            info!(removed, max_age_secs = self.max_age.as_secs(), "Expiry sweep complete");
        } else {
            debug!("Expiry sweep found nothing to remove");
        }
        removed
    }

    /// Remove entries idle for longer than `max_age`.
    pub async fn cleanup_old_items(&self, max_age: Duration) -> usize {
        self.store.write().await.cleanup_old_items(max_age)
    }

    /// Flush the whole cache and invoke the reclaim hook if one is installed.
    pub async fn force_garbage_collection(&self) -> usize {
        let removed = self.store.write().await.clear_all();
        if let Some(reclaimer) = &self.reclaimer {
            reclaimer.reclaim();
        }
        info!(removed, "Forced cache flush");
        removed
    }

    /// Start sweeping in the background until `shutdown` fires.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let interval = self.interval;
        spawn_periodic("janitor", interval, shutdown, move || {
            let janitor = self.clone();
            async move {
                janitor.sweep().await;
            }
        })
    }
}
