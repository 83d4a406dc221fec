//! Request tracker: ID minting and pending-request correlation.
//!
//! IDs are minted from an atomic counter, so they never collide within a
//! session. Pending entries hold the success and error callbacks by value;
//! [`RequestTracker::complete`] removes an entry atomically, and the caller
//! invokes the returned callbacks with no tracker lock held.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use loommcp_protocol::types::ProgressToken;
use loommcp_protocol::{Error, RequestId};
use parking_lot::Mutex;
use serde_json::Value;

/// Success callback, consumed on completion
pub type OkCallback = Box<dyn FnOnce(Value) + Send>;

/// Error callback, consumed on failure, timeout, cancel, or shutdown
pub type ErrCallback = Box<dyn FnOnce(Error) + Send>;

/// Observer invoked for each progress notification matching the request
pub type ProgressObserver = Arc<dyn Fn(f64, Option<String>) + Send + Sync>;

/// State held for one in-flight outbound request
///
/// The callbacks are `FnOnce` trait objects, which are `Send` but not
/// `Sync`; they're wrapped in a `Mutex` purely so `PendingRequest` (and
/// thus the tracker's `DashMap`) satisfies `Sync`, even though each entry
/// is only ever accessed by the single owner that removes it.
pub struct PendingRequest {
    /// Invoked with the peer's result
    pub on_ok: Mutex<Option<OkCallback>>,
    /// Invoked with the terminal error
    pub on_err: Mutex<Option<ErrCallback>>,
    /// When the request was registered
    pub started_at: Instant,
    /// Progress token embedded in the request's `_meta`, if any
    pub progress_token: Option<ProgressToken>,
    /// Observer for progress notifications carrying that token
    pub progress_observer: Option<ProgressObserver>,
}

impl PendingRequest {
    /// Take and invoke the success callback, if not already consumed
    pub fn call_ok(&self, value: Value) {
        if let Some(cb) = self.on_ok.lock().take() {
            cb(value);
        }
    }

    /// Take and invoke the error callback, if not already consumed
    pub fn call_err(&self, error: Error) {
        if let Some(cb) = self.on_err.lock().take() {
            cb(error);
        }
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("started_at", &self.started_at)
            .field("progress_token", &self.progress_token)
            .finish_non_exhaustive()
    }
}

/// Tracks in-flight outbound requests for one session
#[derive(Debug, Default)]
pub struct RequestTracker {
    next_id: AtomicI64,
    pending: DashMap<RequestId, PendingRequest>,
}

impl RequestTracker {
    /// Create an empty tracker; IDs start at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next request ID
    pub fn allocate(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Store the pending entry for `id`
    pub fn register(&self, id: RequestId, pending: PendingRequest) {
        self.pending.insert(id, pending);
    }

    /// Atomically remove and return the entry for `id`
    ///
    /// Returning the entry (instead of invoking callbacks here) keeps
    /// callback invocation outside every tracker lock.
    pub fn complete(&self, id: &RequestId) -> Option<PendingRequest> {
        self.pending.remove(id).map(|(_, pending)| pending)
    }

    /// Drain every pending entry, for session teardown
    pub fn drain_all(&self) -> Vec<(RequestId, PendingRequest)> {
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        ids.into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .collect()
    }

    /// Find the request that carries `token`, with its observer
    pub fn request_for_token(
        &self,
        token: &ProgressToken,
    ) -> Option<(RequestId, Option<ProgressObserver>)> {
        self.pending.iter().find_map(|entry| {
            (entry.value().progress_token.as_ref() == Some(token))
                .then(|| (entry.key().clone(), entry.value().progress_observer.clone()))
        })
    }

    /// Number of in-flight requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn noop_pending() -> PendingRequest {
        PendingRequest {
            on_ok: Mutex::new(Some(Box::new(|_| {}))),
            on_err: Mutex::new(Some(Box::new(|_| {}))),
            started_at: Instant::now(),
            progress_token: None,
            progress_observer: None,
        }
    }

    #[test]
    fn allocated_ids_are_pairwise_distinct() {
        let tracker = RequestTracker::new();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(tracker.allocate()));
        }
    }

    #[test]
    fn concurrent_allocation_never_collides() {
        let tracker = Arc::new(RequestTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| tracker.allocate()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn complete_removes_exactly_once() {
        let tracker = RequestTracker::new();
        let id = tracker.allocate();
        tracker.register(id.clone(), noop_pending());

        assert!(tracker.complete(&id).is_some());
        assert!(tracker.complete(&id).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn unknown_id_completes_to_none() {
        let tracker = RequestTracker::new();
        assert!(tracker.complete(&RequestId::Number(404)).is_none());
    }

    #[test]
    fn drain_all_returns_everything() {
        let tracker = RequestTracker::new();
        for _ in 0..5 {
            let id = tracker.allocate();
            tracker.register(id, noop_pending());
        }
        assert_eq!(tracker.drain_all().len(), 5);
        assert!(tracker.is_empty());
    }

    #[test]
    fn token_lookup_finds_owner() {
        let tracker = RequestTracker::new();
        let id = tracker.allocate();
        let mut pending = noop_pending();
        pending.progress_token = Some(ProgressToken::from("p1"));
        tracker.register(id.clone(), pending);

        let (owner, observer) = tracker
            .request_for_token(&ProgressToken::from("p1"))
            .unwrap();
        assert_eq!(owner, id);
        assert!(observer.is_none());
        assert!(tracker.request_for_token(&ProgressToken::from("p2")).is_none());
    }
}
