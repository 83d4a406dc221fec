//! Cooperative cancellation for inbound requests.
//!
//! Each dispatched inbound request gets a cancellation signal bound to its
//! ID. Handlers poll the read half; `notifications/cancelled` sets the write
//! half. Cancelling twice, or cancelling an unknown ID (the request may have
//! already completed), is a silent no-op.

use dashmap::DashMap;
use loommcp_protocol::RequestId;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation signals for in-flight inbound requests
#[derive(Debug, Default)]
pub struct CancellationManager {
    entries: DashMap<RequestId, CancellationToken>,
}

impl CancellationManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the signal for `id` and return the token handlers poll
    pub fn register(&self, id: RequestId) -> CancellationToken {
        let source = CancellationToken::new();
        let token = source.child_token();
        self.entries.insert(id, source);
        token
    }

    /// Set the signal for `id` and drop the entry; idempotent
    pub fn cancel(&self, id: &RequestId) {
        match self.entries.remove(id) {
            Some((_, source)) => {
                debug!(%id, "inbound request cancelled");
                source.cancel();
            }
            // Unknown or already-completed request: accepted silently.
            None => debug!(%id, "cancellation for unknown request ignored"),
        }
    }

    /// Drop the entry for `id` without signalling (handler completed)
    pub fn remove(&self, id: &RequestId) {
        self.entries.remove(id);
    }

    /// Signal every in-flight request (session teardown)
    pub fn cancel_all(&self) {
        let ids: Vec<RequestId> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.cancel(&id);
        }
    }

    /// Number of in-flight inbound requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no inbound request is in flight
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_sets_the_token() {
        let manager = CancellationManager::new();
        let token = manager.register(RequestId::Number(1));
        assert!(!token.is_cancelled());

        manager.cancel(&RequestId::Number(1));
        assert!(token.is_cancelled());
        assert!(manager.is_empty());
    }

    #[test]
    fn double_cancel_is_a_noop() {
        let manager = CancellationManager::new();
        let token = manager.register(RequestId::Number(1));
        for _ in 0..3 {
            manager.cancel(&RequestId::Number(1));
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn unknown_id_is_accepted_silently() {
        let manager = CancellationManager::new();
        manager.cancel(&RequestId::String("gone".into()));
        assert!(manager.is_empty());
    }

    #[test]
    fn remove_does_not_signal() {
        let manager = CancellationManager::new();
        let token = manager.register(RequestId::Number(2));
        manager.remove(&RequestId::Number(2));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_all_signals_everything() {
        let manager = CancellationManager::new();
        let tokens: Vec<_> = (0..4)
            .map(|n| manager.register(RequestId::Number(n)))
            .collect();
        manager.cancel_all();
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(manager.is_empty());
    }
}
