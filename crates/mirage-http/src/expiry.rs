//! TTL expiry.
//!
//! Each registration with a TTL arms a one-shot task that removes the
//! configuration name from the registry when it fires. Timers are not
//! cancelled when a name is re-registered: the first timer removes whatever
//! holds the name at that moment.

use crate::metrics;
use crate::registry::Registry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info};

struct ArmedTimer {
    id: u64,
    handle: AbortHandle,
}

type Timers = Arc<Mutex<HashMap<String, Vec<ArmedTimer>>>>;

/// Timers keyed by configuration name.
pub struct ExpiryScheduler {
    registry: Arc<Registry>,
    timers: Timers,
    next_id: AtomicU64,
}

impl ExpiryScheduler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Remove `name` from the registry once `ttl` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, name: &str, ttl: Duration) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.registry);
        let timers = Arc::clone(&self.timers);
        let key = name.to_string();

        // Held across the spawn so the task cannot prune itself before it is recorded
        let mut armed = self.timers.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let removed = registry.remove(&key);
            metrics::record_removal("ttl", removed);
            if removed {
                info!(config = %key, ttl = ?ttl, "configuration expired");
            } else {
                debug!(config = %key, "expiry fired for a configuration already removed");
            }

            let mut timers = timers.lock();
            if let Some(pending) = timers.get_mut(&key) {
                pending.retain(|timer| timer.id != id);
                if pending.is_empty() {
                    timers.remove(&key);
                }
            }
        });
        armed.entry(name.to_string()).or_default().push(ArmedTimer {
            id,
            handle: task.abort_handle(),
        });
        debug!(config = %name, ttl = ?ttl, "expiry armed");
    }

    /// Number of timers still pending for `name`.
    pub fn pending(&self, name: &str) -> usize {
        self.timers.lock().get(name).map_or(0, Vec::len)
    }

    /// Abort every pending timer for `name`. Returns how many were aborted.
    pub fn cancel(&self, name: &str) -> usize {
        let cancelled = self.timers.lock().remove(name).unwrap_or_default();
        for timer in &cancelled {
            timer.handle.abort();
        }
        cancelled.len()
    }

    /// Abort every pending timer.
    pub fn shutdown(&self) {
        let timers: Vec<ArmedTimer> = self
            .timers
            .lock()
            .drain()
            .flat_map(|(_, pending)| pending)
            .collect();
        if !timers.is_empty() {
            debug!(count = timers.len(), "aborting pending expiry timers");
        }
        for timer in timers {
            timer.handle.abort();
        }
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
