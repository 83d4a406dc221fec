//! Elicitation orchestration: form mode and URL-mode correlation.
//!
//! Form mode is synchronous: the handler returns the user's action and the
//! request is answered with it. URL mode answers `pending` immediately and
//! parks the elicitation ID here; the matching
//! `notifications/elicitation/complete` resolves it and runs the
//! continuation. Completions for unknown IDs are dropped.

use dashmap::DashMap;
use loommcp_protocol::types::{ElicitResult, ElicitationCompleteParams};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Continuation invoked with the terminal result of a URL-mode elicitation
pub type ElicitationContinuation = Box<dyn FnOnce(ElicitResult) + Send>;

/// Pending URL-mode elicitations, keyed by elicitation ID
///
/// Continuations are wrapped in a `Mutex` purely so the map's value type
/// is `Sync` (`FnOnce` trait objects are `Send` but not `Sync`); each entry
/// is only ever accessed by the single completion that removes it.
#[derive(Default)]
pub struct ElicitationRouter {
    pending: DashMap<String, Mutex<ElicitationContinuation>>,
}

impl ElicitationRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a continuation under `elicitation_id`
    pub fn register(&self, elicitation_id: String, continuation: ElicitationContinuation) {
        debug!(%elicitation_id, "url elicitation pending");
        self.pending.insert(elicitation_id, Mutex::new(continuation));
    }

    /// Resolve a completion notification
    ///
    /// Unknown IDs are dropped; completing the same ID twice runs the
    /// continuation once.
    pub fn complete(&self, params: ElicitationCompleteParams) {
        match self.pending.remove(&params.elicitation_id) {
            Some((_, continuation)) => {
                debug!(elicitation_id = %params.elicitation_id, "url elicitation resolved");
                continuation.into_inner()(params.result);
            }
            None => {
                warn!(
                    elicitation_id = %params.elicitation_id,
                    "completion for unknown elicitation dropped"
                );
            }
        }
    }

    /// Number of unresolved URL-mode elicitations
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for ElicitationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElicitationRouter")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loommcp_protocol::types::ElicitationAction;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn complete_params(id: &str) -> ElicitationCompleteParams {
        ElicitationCompleteParams {
            elicitation_id: id.to_string(),
            result: ElicitResult {
                action: ElicitationAction::Accept,
                content: None,
            },
        }
    }

    #[test]
    fn completion_resolves_pending_entry() {
        let router = ElicitationRouter::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        router.register(
            "e-1".into(),
            Box::new(move |result| {
                assert_eq!(result.action, ElicitationAction::Accept);
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        router.complete(complete_params("e-1"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn unknown_and_duplicate_completions_are_dropped() {
        let router = ElicitationRouter::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        router.register(
            "e-1".into(),
            Box::new(move |_| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        router.complete(complete_params("e-unknown"));
        router.complete(complete_params("e-1"));
        router.complete(complete_params("e-1"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
