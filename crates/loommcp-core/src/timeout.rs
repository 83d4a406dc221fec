//! Per-request deadlines on a monotonic clock.
//!
//! Deadlines are `Instant`s, never wall-clock times. A low-frequency sweeper
//! task drives [`TimeoutManager::sweep`], which removes expired entries
//! under the lock and invokes their callbacks after releasing it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use loommcp_protocol::RequestId;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Callback invoked when an entry's deadline elapses
pub type ExpiryCallback = Box<dyn FnOnce() + Send>;

struct TimeoutEntry {
    deadline: Instant,
    duration: Duration,
    on_expiry: ExpiryCallback,
}

/// Deadline bookkeeping for one session's outbound requests
#[derive(Default)]
pub struct TimeoutManager {
    entries: Mutex<HashMap<RequestId, TimeoutEntry>>,
}

impl TimeoutManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a deadline `duration` from now for `id`
    pub fn set(&self, id: RequestId, duration: Duration, on_expiry: ExpiryCallback) {
        let entry = TimeoutEntry {
            deadline: Instant::now() + duration,
            duration,
            on_expiry,
        };
        self.entries.lock().insert(id, entry);
    }

    /// Disarm the deadline for `id`; returns whether an entry existed
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Re-arm `id`'s deadline to its original duration from now
    ///
    /// Called when a progress notification proves the peer is still working.
    pub fn reset_on_progress(&self, id: &RequestId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.deadline = Instant::now() + entry.duration;
                trace!(%id, "timeout re-armed on progress");
                true
            }
            None => false,
        }
    }

    /// Expire every entry whose deadline has passed
    ///
    /// Removes expired entries under the lock, invokes their callbacks with
    /// the lock released, and returns the expired IDs so the caller can
    /// coordinate with the request tracker.
    pub fn sweep(&self) -> Vec<RequestId> {
        let now = Instant::now();
        let expired: Vec<(RequestId, ExpiryCallback)> = {
            let mut entries = self.entries.lock();
            let ids: Vec<RequestId> = entries
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.on_expiry)))
                .collect()
        };

        let mut ids = Vec::with_capacity(expired.len());
        for (id, on_expiry) in expired {
            trace!(%id, "request timed out");
            on_expiry();
            ids.push(id);
        }
        ids
    }

    /// Drop every entry without invoking callbacks (session teardown)
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of armed deadlines
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no deadline is armed
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Spawn the sweeper task driving [`sweep`](Self::sweep) until `shutdown`
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        granularity: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(granularity);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        manager.sweep();
                    }
                }
            }
        })
    }
}
