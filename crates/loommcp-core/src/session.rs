//! Role-typed session core.
//!
//! A [`SessionCore`] binds a transport to the request fabric: the tracker,
//! the timeout manager, the cancellation manager, and the handler tables.
//! The session is the single consumer of the transport's inbound frames; a
//! background dispatch task routes each frame as a response (correlated to
//! a pending request), a request (handed to a handler with a fresh
//! [`RequestContext`]), or a notification.
//!
//! The `R: Role` parameter fixes which capability types each side of the
//! handshake carries; `loommcp-client` and `loommcp-server` wrap the two
//! instantiations with their feature sub-systems.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use loommcp_protocol::capabilities::{ClientCapabilities, ServerCapabilities};
use loommcp_protocol::codec::{self, Framing};
use loommcp_protocol::jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload,
};
use loommcp_protocol::methods;
use loommcp_protocol::types::{
    CancelledNotificationParams, Implementation, ProgressNotificationParams, ProgressToken,
    progress_token_from_params,
};
use loommcp_protocol::{Error, RequestId, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::cancellation::CancellationManager;
use crate::context::{PeerHandle, PeerLink, RequestContext};
use crate::timeout::TimeoutManager;
use crate::tracker::{ErrCallback, OkCallback, PendingRequest, ProgressObserver, RequestTracker};
use loommcp_transport::Transport;

/// Which side of the handshake a session plays
pub trait Role: Send + Sync + 'static {
    /// Capability structure this side advertises
    type Capabilities: Clone + Send + Sync + 'static;
    /// Capability structure the peer advertises
    type PeerCapabilities: Clone + Send + Sync + 'static;
    /// Role name, for diagnostics
    const NAME: &'static str;
}

/// The client side of MCP
#[derive(Debug, Clone, Copy)]
pub struct ClientRole;

impl Role for ClientRole {
    type Capabilities = ClientCapabilities;
    type PeerCapabilities = ServerCapabilities;
    const NAME: &'static str = "client";
}

/// The server side of MCP
#[derive(Debug, Clone, Copy)]
pub struct ServerRole;

impl Role for ServerRole {
    type Capabilities = ServerCapabilities;
    type PeerCapabilities = ClientCapabilities;
    const NAME: &'static str = "server";
}

/// The remote party's identity and negotiated capabilities
///
/// Populated exactly once, after the initialize handshake succeeds.
#[derive(Debug, Clone)]
pub struct PeerInfo<C> {
    /// Peer name and version
    pub implementation: Implementation,
    /// Capabilities the peer advertised
    pub capabilities: C,
    /// Protocol version both sides agreed on
    pub protocol_version: String,
}

/// Session tuning knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline applied to requests sent without an explicit timeout
    pub default_request_timeout: Duration,
    /// Granularity of the timeout sweeper
    pub sweep_granularity: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_request_timeout: Duration::from_secs(60),
            sweep_granularity: Duration::from_millis(100),
        }
    }
}

/// Handler for one inbound request method
pub type RequestHandlerFn =
    Arc<dyn Fn(JsonRpcRequest, RequestContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Handler for one inbound notification method
pub type NotificationHandlerFn =
    Arc<dyn Fn(JsonRpcNotification) -> BoxFuture<'static, ()> + Send + Sync>;

/// Per-request send options
#[derive(Default)]
pub struct RequestOptions {
    /// Deadline override; the session default applies when absent
    pub timeout: Option<Duration>,
    /// Progress token to embed in `params._meta.progressToken`
    pub progress_token: Option<ProgressToken>,
    /// Observer for progress notifications carrying that token
    pub on_progress: Option<ProgressObserver>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("progress_token", &self.progress_token)
            .finish_non_exhaustive()
    }
}

/// Role-typed session binding a transport to the request fabric
pub struct SessionCore<R: Role> {
    inner: Arc<SessionInner<R>>,
}

impl<R: Role> Clone for SessionCore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub(crate) struct SessionInner<R: Role> {
    self_weak: Weak<SessionInner<R>>,
    transport: Box<dyn Transport>,
    config: SessionConfig,
    tracker: RequestTracker,
    timeouts: Arc<TimeoutManager>,
    cancellations: CancellationManager,
    request_handlers: RwLock<HashMap<String, RequestHandlerFn>>,
    notification_handlers: RwLock<HashMap<String, NotificationHandlerFn>>,
    peer: RwLock<Option<PeerInfo<R::PeerCapabilities>>>,
    initialized: AtomicBool,
    shutdown: CancellationToken,
    dispatch_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    sweeper_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<R: Role> SessionCore<R> {
    /// Bind `transport` into a new session; ownership transfers here
    pub fn new(transport: Box<dyn Transport>, config: SessionConfig) -> Self {
        let inner = Arc::new_cyclic(|self_weak| SessionInner {
            self_weak: self_weak.clone(),
            transport,
            config,
            tracker: RequestTracker::new(),
            timeouts: Arc::new(TimeoutManager::new()),
            cancellations: CancellationManager::new(),
            request_handlers: RwLock::new(HashMap::new()),
            notification_handlers: RwLock::new(HashMap::new()),
            peer: RwLock::new(None),
            initialized: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            dispatch_task: Mutex::new(None),
            sweeper_task: Mutex::new(None),
        });
        Self { inner }
    }

    /// Connect the transport and start dispatching inbound messages
    ///
    /// # Errors
    ///
    /// Propagates the transport's connect failure.
    pub async fn connect(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        self.inner
            .transport
            .set_message_callback(Arc::new(move |frame| {
                // Frames queue here and are consumed by the dispatch task,
                // preserving arrival order.
                let _ = tx.send(frame);
            }));

        let weak = self.inner.self_weak.clone();
        self.inner
            .transport
            .set_error_callback(Arc::new(move |transport_error| {
                if let Some(inner) = weak.upgrade() {
                    warn!(role = R::NAME, "transport failed: {transport_error}");
                    let error = match transport_error {
                        loommcp_transport::TransportError::Eof => Error::Eof,
                        _ => Error::Disconnected,
                    };
                    inner.fail_all_pending(error);
                }
            }));

        self.inner
            .transport
            .connect()
            .await
            .map_err(|e| Error::SendFailed(e.to_string()))?;

        let weak = self.inner.self_weak.clone();
        let shutdown = self.inner.shutdown.clone();
        let dispatch = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    frame = rx.recv() => {
                        let Some(frame) = frame else { break };
                        let Some(inner) = weak.upgrade() else { break };
                        inner.dispatch_frame(frame).await;
                    }
                }
            }
            trace!(role = R::NAME, "session dispatch task stopped");
        });
        *self.inner.dispatch_task.lock() = Some(dispatch);

        let sweeper = self
            .inner
            .timeouts
            .spawn_sweeper(self.inner.config.sweep_granularity, self.inner.shutdown.clone());
        *self.inner.sweeper_task.lock() = Some(sweeper);

        debug!(role = R::NAME, "session connected");
        Ok(())
    }

    /// Tear the session down
    ///
    /// Stops dispatch, disconnects the transport, fails every outstanding
    /// request with [`Error::Shutdown`], disarms all timeouts, and signals
    /// all inbound cancellation tokens. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature leaves room for transports whose
    /// teardown can.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.shutdown.cancel();
        let _ = self.inner.transport.disconnect().await;

        if let Some(task) = self.inner.dispatch_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.inner.sweeper_task.lock().take() {
            task.abort();
        }

        self.inner.fail_all_pending(Error::Shutdown);
        self.inner.timeouts.clear();
        self.inner.cancellations.cancel_all();
        debug!(role = R::NAME, "session disconnected");
        Ok(())
    }

    /// Whether the underlying transport is connected
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Send a request, wiring explicit success and error callbacks
    ///
    /// Exactly one of `on_ok`/`on_err` will eventually be invoked: by the
    /// response, the timeout, a cancel, or session teardown, whichever comes
    /// first.
    ///
    /// # Errors
    ///
    /// Fails only when `options.progress_token` is set while `params` is a
    /// non-object; transport failures are delivered through `on_err`.
    pub async fn send_request_with_callbacks(
        &self,
        method: &str,
        params: Option<Value>,
        on_ok: OkCallback,
        on_err: ErrCallback,
        options: RequestOptions,
    ) -> Result<RequestId> {
        self.inner
            .send_request_raw(method, params, on_ok, on_err, options)
            .await
    }

    /// Send a request and await its result
    ///
    /// # Errors
    ///
    /// Whatever the request terminally fails with: a peer error, a timeout,
    /// a cancel, or shutdown.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.request_with_options(
            method,
            params,
            RequestOptions {
                timeout,
                ..Default::default()
            },
        )
        .await
    }

    /// Send a request with full options and await its result
    ///
    /// # Errors
    ///
    /// Whatever the request terminally fails with.
    pub async fn request_with_options(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        self.inner.request_value(method, params, options).await
    }

    /// Send a fire-and-forget notification
    ///
    /// # Errors
    ///
    /// Fails when the frame cannot be enqueued on the transport.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.inner.notify_peer(method, params).await
    }

    /// Cancel an in-flight outbound request
    ///
    /// Removes the local pending entry (so a late response is discarded),
    /// fails the request with [`Error::Cancelled`], and emits
    /// `notifications/cancelled` to the peer.
    ///
    /// # Errors
    ///
    /// Fails when the cancellation notification cannot be sent.
    pub async fn cancel_request(&self, id: &RequestId, reason: Option<String>) -> Result<()> {
        self.inner.timeouts.cancel(id);
        if let Some(pending) = self.inner.tracker.complete(id) {
            pending.call_err(Error::Cancelled);
        }
        let params = CancelledNotificationParams {
            request_id: id.clone(),
            reason,
        };
        self.send_notification(
            methods::NOTIFICATION_CANCELLED,
            Some(serde_json::to_value(params)?),
        )
        .await
    }

    /// Install a handler for an inbound request method
    ///
    /// # Errors
    ///
    /// Rejects reserved MCP methods; those are handled inside the library.
    pub fn set_request_handler(&self, method: &str, handler: RequestHandlerFn) -> Result<()> {
        if methods::is_reserved(method) {
            return Err(Error::InvalidParams(format!(
                "method '{method}' is handled internally"
            )));
        }
        self.install_request_handler(method, handler);
        Ok(())
    }

    /// Install a handler for an inbound notification method
    ///
    /// # Errors
    ///
    /// Rejects reserved MCP methods; those are handled inside the library.
    pub fn set_notification_handler(
        &self,
        method: &str,
        handler: NotificationHandlerFn,
    ) -> Result<()> {
        if methods::is_reserved(method) {
            return Err(Error::InvalidParams(format!(
                "method '{method}' is handled internally"
            )));
        }
        self.install_notification_handler(method, handler);
        Ok(())
    }

    /// Handler installation without the reserved-method guard
    ///
    /// Used by the client and server layers to wire the MCP feature
    /// sub-systems into the dispatch tables.
    #[doc(hidden)]
    pub fn install_request_handler(&self, method: &str, handler: RequestHandlerFn) {
        self.inner
            .request_handlers
            .write()
            .insert(method.to_string(), handler);
    }

    /// Notification handler installation without the reserved-method guard
    #[doc(hidden)]
    pub fn install_notification_handler(&self, method: &str, handler: NotificationHandlerFn) {
        self.inner
            .notification_handlers
            .write()
            .insert(method.to_string(), handler);
    }

    /// Record the peer's identity and capabilities
    ///
    /// # Errors
    ///
    /// Fails when peer info was already recorded; it is written exactly once
    /// per session, after the handshake.
    pub fn set_peer_info(&self, info: PeerInfo<R::PeerCapabilities>) -> Result<()> {
        let mut guard = self.inner.peer.write();
        if guard.is_some() {
            return Err(Error::Internal("peer info already recorded".into()));
        }
        *guard = Some(info);
        Ok(())
    }

    /// The peer's identity and capabilities, once the handshake completed
    pub fn peer_info(&self) -> Option<PeerInfo<R::PeerCapabilities>> {
        self.inner.peer.read().clone()
    }

    /// Mark the handshake as fully settled
    pub fn mark_initialized(&self) {
        self.inner.initialized.store(true, Ordering::SeqCst);
    }

    /// Whether the handshake has fully settled
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// A liveness-checked handle for issuing requests to the peer
    pub fn peer_handle(&self) -> PeerHandle {
        let weak: Weak<dyn PeerLink> = self.inner.self_weak.clone();
        PeerHandle::new(weak)
    }

    /// A non-owning handle to this session
    ///
    /// Feature layers store this inside handler closures they install on the
    /// session itself; a strong handle there would keep the session alive
    /// through its own handler table.
    pub fn downgrade(&self) -> WeakSession<R> {
        WeakSession {
            inner: self.inner.self_weak.clone(),
        }
    }

    /// Number of in-flight outbound requests
    pub fn pending_requests(&self) -> usize {
        self.inner.tracker.len()
    }
}

/// Non-owning handle to a [`SessionCore`]
pub struct WeakSession<R: Role> {
    inner: Weak<SessionInner<R>>,
}

impl<R: Role> Clone for WeakSession<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Role> WeakSession<R> {
    /// Recover the session, if it is still alive
    pub fn upgrade(&self) -> Option<SessionCore<R>> {
        self.inner.upgrade().map(|inner| SessionCore { inner })
    }
}

impl<R: Role> std::fmt::Debug for WeakSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakSession")
            .field("role", &R::NAME)
            .field("live", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<R: Role> std::fmt::Debug for SessionCore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCore")
            .field("role", &R::NAME)
            .field("pending", &self.inner.tracker.len())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl<R: Role> SessionInner<R> {
    fn strong(&self) -> Arc<Self> {
        self.self_weak
            .upgrade()
            .expect("session inner invoked after drop")
    }

    fn fail_all_pending(&self, err: Error) {
        for (id, pending) in self.tracker.drain_all() {
            self.timeouts.cancel(&id);
            pending.call_err(err.clone());
        }
    }

    async fn dispatch_frame(self: Arc<Self>, frame: Bytes) {
        match codec::decode_message(&frame) {
            Ok(JsonRpcMessage::Response(response)) => self.handle_response(response),
            Ok(JsonRpcMessage::Request(request)) => self.handle_request(request),
            Ok(JsonRpcMessage::Notification(notification)) => {
                self.handle_notification(notification).await;
            }
            Err(decode_error) => {
                warn!(
                    role = R::NAME,
                    "dropping undecodable frame: {}",
                    decode_error.code.description()
                );
                let error = Error::Parse(decode_error.code).to_jsonrpc_error();
                self.send_error_response(decode_error.recovered_id, error)
                    .await;
            }
        }
    }

    fn handle_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.as_request_id().cloned() else {
            warn!(role = R::NAME, "dropping response with null id");
            return;
        };

        let Some(pending) = self.tracker.complete(&id) else {
            // Unknown or already-settled ID; never invokes a handler.
            error!(role = R::NAME, %id, "dropping response for unknown request id");
            return;
        };
        self.timeouts.cancel(&id);

        match response.payload {
            JsonRpcResponsePayload::Success { result } => pending.call_ok(result),
            JsonRpcResponsePayload::Error { error } => pending.call_err(Error::Peer {
                code: error.code,
                message: error.message,
            }),
        }
    }

    fn handle_request(&self, request: JsonRpcRequest) {
        let id = request.id.clone();
        let method = request.method.clone();
        let handler = self.request_handlers.read().get(&method).cloned();

        let Some(handler) = handler else {
            debug!(role = R::NAME, %method, "no handler for inbound request");
            let inner = self.strong();
            tokio::spawn(async move {
                let error = Error::MethodNotFound(method).to_jsonrpc_error();
                inner.send_error_response(Some(id), error).await;
            });
            return;
        };

        let cancellation = self.cancellations.register(id.clone());
        let progress_token = progress_token_from_params(request.params.as_ref());
        let peer_link: Weak<dyn PeerLink> = self.self_weak.clone();
        let ctx = RequestContext::new(
            id.clone(),
            progress_token,
            cancellation,
            PeerHandle::new(peer_link),
        );

        let inner = self.strong();
        tokio::spawn(async move {
            let outcome = std::panic::AssertUnwindSafe(handler(request, ctx))
                .catch_unwind()
                .await;
            let settled = match outcome {
                Ok(result) => result,
                Err(_) => Err(Error::Internal("request handler panicked".into())),
            };

            match settled {
                Ok(value) => inner.send_ok_response(id.clone(), value).await,
                Err(err) => {
                    inner
                        .send_error_response(Some(id.clone()), err.to_jsonrpc_error())
                        .await;
                }
            }
            inner.cancellations.remove(&id);
        });
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            methods::NOTIFICATION_CANCELLED => {
                let Some(params) = notification.params else {
                    warn!(role = R::NAME, "cancellation notification without params");
                    return;
                };
                match serde_json::from_value::<CancelledNotificationParams>(params) {
                    Ok(cancel) => self.cancellations.cancel(&cancel.request_id),
                    Err(_) => warn!(role = R::NAME, "malformed cancellation notification"),
                }
            }
            methods::NOTIFICATION_PROGRESS => {
                let Some(params) = notification.params else {
                    warn!(role = R::NAME, "progress notification without params");
                    return;
                };
                match serde_json::from_value::<ProgressNotificationParams>(params) {
                    Ok(progress) => self.handle_progress(progress),
                    Err(_) => warn!(role = R::NAME, "malformed progress notification"),
                }
            }
            method => {
                let handler = self.notification_handlers.read().get(method).cloned();
                match handler {
                    Some(handler) => handler(notification).await,
                    None => {
                        debug!(role = R::NAME, %method, "dropping unhandled notification");
                    }
                }
            }
        }
    }

    fn handle_progress(&self, progress: ProgressNotificationParams) {
        let Some((owner, observer)) = self.tracker.request_for_token(&progress.progress_token)
        else {
            debug!(
                role = R::NAME,
                token = %progress.progress_token,
                "progress for unknown token ignored"
            );
            return;
        };

        // Evidence the peer is still working: push the deadline out.
        self.timeouts.reset_on_progress(&owner);
        if let Some(observer) = observer {
            observer(progress.progress, progress.message);
        }
    }

    async fn send_ok_response(&self, id: RequestId, result: Value) {
        let bytes = codec::encode_response_ok(id, result, Framing::None);
        if let Err(e) = self.transport.send(bytes).await {
            warn!(role = R::NAME, "failed to send response: {e}");
        }
    }

    async fn send_error_response(&self, id: Option<RequestId>, error: JsonRpcError) {
        let bytes = codec::encode_response_err(id, error, Framing::None);
        if let Err(e) = self.transport.send(bytes).await {
            warn!(role = R::NAME, "failed to send error response: {e}");
        }
    }

    async fn send_request_raw(
        &self,
        method: &str,
        params: Option<Value>,
        on_ok: OkCallback,
        on_err: ErrCallback,
        options: RequestOptions,
    ) -> Result<RequestId> {
        let id = self.tracker.allocate();

        let params = match (&options.progress_token, params) {
            (None, params) => params,
            (Some(token), None) => Some(serde_json::json!({
                "_meta": { "progressToken": token }
            })),
            (Some(token), Some(Value::Object(mut object))) => {
                let meta = object
                    .entry("_meta")
                    .or_insert_with(|| Value::Object(serde_json::Map::new()));
                if let Value::Object(meta) = meta {
                    meta.insert("progressToken".into(), serde_json::to_value(token)?);
                }
                Some(Value::Object(object))
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidParams(
                    "progress tokens require object params".into(),
                ));
            }
        };

        self.tracker.register(
            id.clone(),
            PendingRequest {
                on_ok: Mutex::new(Some(on_ok)),
                on_err: Mutex::new(Some(on_err)),
                started_at: Instant::now(),
                progress_token: options.progress_token,
                progress_observer: options.on_progress,
            },
        );

        let duration = options
            .timeout
            .unwrap_or(self.config.default_request_timeout);
        let weak = self.self_weak.clone();
        let expiry_id = id.clone();
        self.timeouts.set(
            id.clone(),
            duration,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    if let Some(pending) = inner.tracker.complete(&expiry_id) {
                        pending.call_err(Error::Timeout);
                    }
                }
            }),
        );

        let request = JsonRpcRequest::new(id.clone(), method, params);
        let bytes = codec::encode_request(&request, Framing::None);
        if let Err(e) = self.transport.send(bytes).await {
            // The request never left: settle it through the error callback
            // so the caller still sees exactly one completion.
            self.timeouts.cancel(&id);
            if let Some(pending) = self.tracker.complete(&id) {
                pending.call_err(Error::SendFailed(e.to_string()));
            }
        }
        Ok(id)
    }

    async fn request_value(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let (tx, rx) = oneshot::channel::<Result<Value>>();
        let slot = Arc::new(Mutex::new(Some(tx)));

        let ok_slot = slot.clone();
        let on_ok: OkCallback = Box::new(move |value| {
            if let Some(tx) = ok_slot.lock().take() {
                let _ = tx.send(Ok(value));
            }
        });
        let on_err: ErrCallback = Box::new(move |err| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(Err(err));
            }
        });

        self.send_request_raw(method, params, on_ok, on_err, options)
            .await?;
        rx.await.map_err(|_| Error::Shutdown)?
    }

    async fn notify_peer(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        let bytes = codec::encode_notification(&notification, Framing::None);
        self.transport
            .send(bytes)
            .await
            .map_err(|e| Error::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl<R: Role> PeerLink for SessionInner<R> {
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.request_value(
            method,
            params,
            RequestOptions {
                timeout,
                ..Default::default()
            },
        )
        .await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.notify_peer(method, params).await
    }

    fn reset_timeout(&self, id: &RequestId) -> bool {
        self.timeouts.reset_on_progress(id)
    }
}

impl<R: Role> Drop for SessionInner<R> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.dispatch_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.sweeper_task.lock().take() {
            task.abort();
        }
    }
}
