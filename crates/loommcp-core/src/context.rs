//! Per-invocation request context.
//!
//! Every inbound request handler receives a [`RequestContext`]: the request
//! ID, the progress token extracted from `params._meta.progressToken`, a
//! cancellation token to poll, and a [`PeerHandle`] for issuing requests
//! back to the remote side (a sampling handler calling `tools/call`, for
//! example). The handle holds no strong pointer to the session, so contexts
//! can outlive it without keeping it alive; every use checks liveness first.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use loommcp_protocol::methods;
use loommcp_protocol::types::{ProgressNotificationParams, ProgressToken};
use loommcp_protocol::{Error, RequestId, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// The slice of a session a context is allowed to reach back into
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Issue a request to the remote side and await its result
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value>;

    /// Send a notification to the remote side
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Re-arm the timeout of the outbound request `id`, if one is armed
    fn reset_timeout(&self, id: &RequestId) -> bool;
}

/// Non-owning, liveness-checked handle to the session's peer
#[derive(Clone)]
pub struct PeerHandle {
    link: Weak<dyn PeerLink>,
}

impl PeerHandle {
    /// Wrap a weak link to the session
    pub fn new(link: Weak<dyn PeerLink>) -> Self {
        Self { link }
    }

    /// A handle whose session is already gone (for tests and defaults)
    pub fn detached() -> Self {
        struct Never;
        #[async_trait]
        impl PeerLink for Never {
            async fn request(
                &self,
                _method: &str,
                _params: Option<Value>,
                _timeout: Option<Duration>,
            ) -> Result<Value> {
                Err(Error::Shutdown)
            }
            async fn notify(&self, _method: &str, _params: Option<Value>) -> Result<()> {
                Err(Error::Shutdown)
            }
            fn reset_timeout(&self, _id: &RequestId) -> bool {
                false
            }
        }
        let arc: Arc<dyn PeerLink> = Arc::new(Never);
        Self {
            link: Arc::downgrade(&arc),
        }
    }

    fn upgrade(&self) -> Result<Arc<dyn PeerLink>> {
        self.link.upgrade().ok_or(Error::Shutdown)
    }

    /// Whether the owning session is still alive
    pub fn is_live(&self) -> bool {
        self.link.strong_count() > 0
    }

    /// Issue a request back to the remote side
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Shutdown`] when the session is gone, otherwise
    /// with whatever the request itself fails with.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.upgrade()?.request(method, params, timeout).await
    }

    /// Send a notification to the remote side
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Shutdown`] when the session is gone.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.upgrade()?.notify(method, params).await
    }

    fn reset_timeout(&self, id: &RequestId) -> bool {
        self.link
            .upgrade()
            .map(|link| link.reset_timeout(id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("live", &self.is_live())
            .finish()
    }
}

/// Per-invocation handle passed to inbound request handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: RequestId,
    progress_token: Option<ProgressToken>,
    cancellation: CancellationToken,
    peer: PeerHandle,
}

impl RequestContext {
    /// Assemble a context; called by the session dispatcher
    pub fn new(
        id: RequestId,
        progress_token: Option<ProgressToken>,
        cancellation: CancellationToken,
        peer: PeerHandle,
    ) -> Self {
        Self {
            id,
            progress_token,
            cancellation,
            peer,
        }
    }

    /// The inbound request's ID
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// The progress token the caller attached, if any
    pub fn progress_token(&self) -> Option<&ProgressToken> {
        self.progress_token.as_ref()
    }

    /// The cancellation token to poll cooperatively
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation has been requested for this invocation
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Handle for issuing requests back to the remote side
    pub fn peer(&self) -> &PeerHandle {
        &self.peer
    }

    /// Emit `notifications/progress` correlated to this request
    ///
    /// `value` is clamped to [0, 100]. A no-op when the caller attached no
    /// progress token. Reporting progress also re-arms this request's
    /// timeout, matching the reset the caller performs on receipt.
    ///
    /// # Errors
    ///
    /// Fails when the session is gone or the notification cannot be sent.
    pub async fn report_progress(&self, value: f64, message: Option<String>) -> Result<()> {
        let Some(token) = &self.progress_token else {
            return Ok(());
        };

        let params = ProgressNotificationParams {
            progress_token: token.clone(),
            progress: value.clamp(0.0, 100.0),
            message,
        };
        self.reset_timeout_on_progress();
        self.peer
            .notify(
                methods::NOTIFICATION_PROGRESS,
                Some(serde_json::to_value(params)?),
            )
            .await
    }

    /// Re-arm the timeout associated with this request's ID, if any
    pub fn reset_timeout_on_progress(&self) -> bool {
        self.peer.reset_timeout(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RequestContext {
        RequestContext::new(
            RequestId::Number(1),
            Some(ProgressToken::from("p1")),
            CancellationToken::new(),
            PeerHandle::detached(),
        )
    }

    #[tokio::test]
    async fn detached_peer_fails_with_shutdown() {
        let ctx = context();
        assert!(!ctx.peer().is_live());
        let err = ctx.peer().request("ping", None, None).await.unwrap_err();
        assert!(matches!(err, Error::Shutdown));
    }

    #[tokio::test]
    async fn report_progress_without_token_is_noop() {
        let ctx = RequestContext::new(
            RequestId::Number(2),
            None,
            CancellationToken::new(),
            PeerHandle::detached(),
        );
        // No token: succeeds without touching the (dead) peer.
        ctx.report_progress(50.0, None).await.unwrap();
    }

    #[test]
    fn cancellation_is_observable() {
        let source = CancellationToken::new();
        let ctx = RequestContext::new(
            RequestId::Number(3),
            None,
            source.child_token(),
            PeerHandle::detached(),
        );
        assert!(!ctx.is_cancelled());
        source.cancel();
        assert!(ctx.is_cancelled());
    }
}
