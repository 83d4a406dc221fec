//! Streamable HTTP transport, server side.
//!
//! This transport owns no HTTP listener. The embedding HTTP server calls
//! [`StreamableHttpTransport::handle_post`] for `POST` ingress,
//! [`StreamableHttpTransport::handle_get`] for the SSE egress stream, and
//! [`StreamableHttpTransport::handle_delete`] to close a session.
//!
//! Sessions are keyed by cryptographically random UUID v4 session IDs,
//! minted on the first `POST` that arrives without one and echoed back via
//! the `Mcp-Session-Id` header. A session that sees no activity for the
//! configured window (default 30 minutes) is purged on the next access.
//!
//! Outbound messages become SSE events `id: N\ndata: <json>\n\n` retained in
//! a bounded per-session ring buffer for `Last-Event-ID` replay. When the
//! ring overflows, the oldest events are dropped and a gap sentinel is
//! enqueued so the client knows to re-initialize.
//!
//! Outbound routing is per session, never a fan-out: each `POST`ed request
//! records which session it came from, and the matching response is
//! enqueued on that session alone. Frames with no request to correlate
//! against (server-initiated requests and notifications) follow the most
//! recently active session.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use loommcp_protocol::RequestId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{
    ErrorCallback, MessageCallback, Transport, TransportError, TransportResult, TransportState,
};

/// Sentinel event data enqueued when the replay ring overflowed
///
/// A client that sees this event has lost messages and should start a fresh
/// session with a new `initialize` exchange.
pub const GAP_EVENT_DATA: &str = r#"{"jsonrpc":"2.0","method":"notifications/gap"}"#;

/// Configuration for the streamable HTTP transport
#[derive(Debug, Clone)]
pub struct StreamableHttpConfig {
    /// Keep-alive comment interval on SSE streams
    pub keep_alive: Duration,
    /// Events retained per session for `Last-Event-ID` replay
    pub replay_buffer_size: usize,
    /// Inactivity window after which a session expires
    pub session_timeout: Duration,
    /// `retry:` value sent in the SSE priming event, in milliseconds
    pub retry_ms: u64,
}

impl Default for StreamableHttpConfig {
    fn default() -> Self {
        StreamableHttpConfigBuilder::new().build()
    }
}

/// Builder for [`StreamableHttpConfig`]
#[derive(Debug, Clone)]
pub struct StreamableHttpConfigBuilder {
    keep_alive: Duration,
    replay_buffer_size: usize,
    session_timeout: Duration,
    retry_ms: u64,
}

impl Default for StreamableHttpConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamableHttpConfigBuilder {
    /// Create a builder with protocol defaults
    pub fn new() -> Self {
        Self {
            keep_alive: Duration::from_secs(15),
            replay_buffer_size: 256,
            session_timeout: Duration::from_secs(30 * 60),
            retry_ms: 3000,
        }
    }

    /// Set the SSE keep-alive interval (default: 15 seconds)
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Set the replay ring size (default: 256 events)
    pub fn with_replay_buffer_size(mut self, size: usize) -> Self {
        self.replay_buffer_size = size.max(1);
        self
    }

    /// Set the session inactivity window (default: 30 minutes)
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the reconnect delay advertised to clients (default: 3000 ms)
    pub fn with_retry_ms(mut self, retry_ms: u64) -> Self {
        self.retry_ms = retry_ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> StreamableHttpConfig {
        StreamableHttpConfig {
            keep_alive: self.keep_alive,
            replay_buffer_size: self.replay_buffer_size,
            session_timeout: self.session_timeout,
            retry_ms: self.retry_ms,
        }
    }
}

/// Outcome of a `POST`, mapped to an HTTP response by the embedding server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    /// HTTP status code (202 accepted, 400 malformed, 404 unknown session)
    pub status: u16,
    /// Value for the `Mcp-Session-Id` response header, when accepted
    pub session_id: Option<String>,
}

/// Sink the embedding HTTP server hands to [`handle_get`]
///
/// `write` receives fully formatted SSE chunks (events, comments, and the
/// retry directive) and returns `false` once the client is gone, which ends
/// the stream loop.
///
/// [`handle_get`]: StreamableHttpTransport::handle_get
#[async_trait]
pub trait SseWriter: Send {
    /// Write one formatted SSE chunk; `false` means the client disconnected
    async fn write(&mut self, chunk: &str) -> bool;
}

/// One stored SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredEvent {
    id: u64,
    data: String,
}

impl StoredEvent {
    fn format(&self) -> String {
        format!("id: {}\ndata: {}\n\n", self.id, self.data)
    }
}

/// Per-session state
struct HttpSession {
    last_activity: Instant,
    last_event_id: u64,
    /// Ring buffer of recent events, delivered and not
    events: VecDeque<StoredEvent>,
    /// Highest event ID already written to some SSE stream
    delivered_up_to: u64,
    /// Live stream sender while a GET is attached
    live: Option<mpsc::UnboundedSender<StoredEvent>>,
}

impl HttpSession {
    fn new() -> Self {
        Self {
            last_activity: Instant::now(),
            last_event_id: 0,
            events: VecDeque::new(),
            delivered_up_to: 0,
            live: None,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn enqueue(&mut self, data: String, capacity: usize) {
        self.last_event_id += 1;
        let event = StoredEvent {
            id: self.last_event_id,
            data,
        };
        self.events.push_back(event.clone());

        if self.events.len() > capacity {
            // Overflow: shed the oldest events, then overwrite the oldest
            // retained slot with a gap sentinel so a replaying client can
            // tell that messages were lost. Event IDs stay monotonic.
            while self.events.len() > capacity {
                self.events.pop_front();
            }
            if let Some(front) = self.events.front_mut() {
                if front.data != GAP_EVENT_DATA {
                    front.data = GAP_EVENT_DATA.to_string();
                }
            }
        }

        if let Some(live) = &self.live {
            if live.send(event).is_err() {
                self.live = None;
            }
        }
    }

    /// Events to replay: everything after `after`, oldest first
    fn replay_after(&self, after: u64) -> Vec<StoredEvent> {
        self.events
            .iter()
            .filter(|event| event.id > after)
            .cloned()
            .collect()
    }
}

/// Server-side streamable HTTP transport
pub struct StreamableHttpTransport {
    config: StreamableHttpConfig,
    state: Arc<Mutex<TransportState>>,
    sessions: Arc<Mutex<HashMap<String, HttpSession>>>,
    /// Which session each in-flight `POST`ed request arrived on
    in_flight: Mutex<HashMap<RequestId, String>>,
    message_callback: Arc<Mutex<Option<MessageCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
}

impl StreamableHttpTransport {
    /// Create a transport with the given configuration
    pub fn new(config: StreamableHttpConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(TransportState::Detached)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Mutex::new(HashMap::new()),
            message_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
        }
    }

    /// Number of live (non-expired) sessions
    pub fn session_count(&self) -> usize {
        self.purge_expired();
        self.sessions.lock().len()
    }

    fn purge_expired(&self) {
        let timeout = self.config.session_timeout;
        {
            let mut sessions = self.sessions.lock();
            sessions.retain(|id, session| {
                let keep = session.last_activity.elapsed() < timeout;
                if !keep {
                    debug!(session_id = %id, "http session expired");
                }
                keep
            });
        }
        self.prune_in_flight();
    }

    /// Drop correlation entries whose session is gone
    fn prune_in_flight(&self) {
        let live: Vec<String> = self.sessions.lock().keys().cloned().collect();
        self.in_flight
            .lock()
            .retain(|_, session_id| live.contains(session_id));
    }

    /// The session to carry frames that correlate to no `POST`ed request
    fn most_recent_session_id(&self) -> Option<String> {
        self.sessions
            .lock()
            .iter()
            .max_by_key(|(_, session)| session.last_activity)
            .map(|(id, _)| id.clone())
    }

    /// Handle `POST` ingress
    ///
    /// Mints a session when `session_id` is absent, validates it otherwise,
    /// then forwards the body to the session message callback. The caller
    /// maps the outcome to an HTTP response and must echo
    /// `outcome.session_id` in the `Mcp-Session-Id` header.
    pub fn handle_post(&self, body: &[u8], session_id: Option<&str>) -> PostOutcome {
        self.purge_expired();

        if body.is_empty() {
            return PostOutcome {
                status: 400,
                session_id: None,
            };
        }

        let session_id = match session_id {
            None => {
                let id = Uuid::new_v4().to_string();
                self.sessions.lock().insert(id.clone(), HttpSession::new());
                debug!(session_id = %id, "http session created");
                id
            }
            Some(id) => {
                let mut sessions = self.sessions.lock();
                match sessions.get_mut(id) {
                    Some(session) => {
                        session.touch();
                        id.to_string()
                    }
                    None => {
                        warn!("post for unknown session rejected");
                        return PostOutcome {
                            status: 404,
                            session_id: None,
                        };
                    }
                }
            }
        };

        // Remember where the request came from so its response can be
        // routed back to this session alone.
        if let Some(request_id) = posted_request_id(body) {
            self.in_flight
                .lock()
                .insert(request_id, session_id.clone());
        }

        let callback = self.message_callback.lock().clone();
        if let Some(callback) = callback {
            callback(Bytes::copy_from_slice(body));
        } else {
            warn!("post body dropped: no message callback installed");
        }

        PostOutcome {
            status: 202,
            session_id: Some(session_id),
        }
    }

    /// Handle `GET` egress: stream SSE events until the client goes away
    ///
    /// Writes the `retry:` priming directive, replays retained events after
    /// `last_event_id` (or all undelivered events when it is absent), then
    /// streams new events interleaved with keep-alive comments.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownSession`] when `session_id` names no
    /// live session; the embedding server maps that to a 404.
    pub async fn handle_get(
        &self,
        session_id: &str,
        last_event_id: Option<u64>,
        writer: &mut dyn SseWriter,
    ) -> TransportResult<()> {
        self.purge_expired();

        let (mut rx, backlog) = {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(session_id)
                .ok_or(TransportError::UnknownSession)?;
            session.touch();

            let after = last_event_id.unwrap_or(session.delivered_up_to);
            let backlog = session.replay_after(after);

            let (tx, rx) = mpsc::unbounded_channel();
            session.live = Some(tx);
            (rx, backlog)
        };

        if !writer.write(&format!("retry: {}\n\n", self.config.retry_ms)).await {
            return Ok(());
        }

        for event in backlog {
            trace!(event_id = event.id, "replaying sse event");
            if !writer.write(&event.format()).await {
                return Ok(());
            }
            self.mark_delivered(session_id, event.id);
        }

        let mut keep_alive = tokio::time::interval(self.config.keep_alive);
        keep_alive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        keep_alive.reset();

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => {
                            let id = event.id;
                            if !writer.write(&event.format()).await {
                                break;
                            }
                            self.mark_delivered(session_id, id);
                        }
                        // Session deleted or replaced by a newer GET.
                        None => break,
                    }
                }
                _ = keep_alive.tick() => {
                    if !writer.write(": ping\n\n").await {
                        break;
                    }
                }
            }
        }

        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.live = None;
            session.touch();
        }
        Ok(())
    }

    /// Handle `DELETE`: close and forget the session
    ///
    /// Returns 204 when the session existed, 404 otherwise.
    pub fn handle_delete(&self, session_id: &str) -> u16 {
        self.purge_expired();
        let removed = self.sessions.lock().remove(session_id).is_some();
        if removed {
            self.prune_in_flight();
            debug!(session_id = %session_id, "http session deleted");
            204
        } else {
            404
        }
    }

    fn mark_delivered(&self, session_id: &str, event_id: u64) {
        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.delivered_up_to = session.delivered_up_to.max(event_id);
            session.touch();
        }
    }
}

impl std::fmt::Debug for StreamableHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpTransport")
            .field("sessions", &self.sessions.lock().len())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn connect(&self) -> TransportResult<()> {
        *self.state.lock() = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        *self.state.lock() = TransportState::Disconnected;
        // Dropping the live senders ends any attached GET loops.
        self.sessions.lock().clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.state.lock() == TransportState::Connected
    }

    async fn send(&self, frame: Bytes) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let data = std::str::from_utf8(&frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?
            .to_string();
        let value: serde_json::Value = serde_json::from_str(&data)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        // Responses go back to the session whose POST carried the request;
        // everything else (server-initiated requests, notifications) follows
        // the most recently active session.
        let target = if value.get("method").is_some() {
            self.most_recent_session_id()
        } else {
            let owner = extract_request_id(&value)
                .and_then(|id| self.in_flight.lock().remove(&id));
            match owner {
                Some(session_id) => Some(session_id),
                None => {
                    warn!("response with no recorded origin; using the active session");
                    self.most_recent_session_id()
                }
            }
        };

        let Some(target) = target else {
            return Err(TransportError::SendFailed("no live http session".into()));
        };

        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&target) {
            Some(session) => {
                session.enqueue(data, self.config.replay_buffer_size);
                Ok(())
            }
            None => Err(TransportError::SendFailed(
                "owning http session expired".into(),
            )),
        }
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        *self.message_callback.lock() = Some(callback);
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.error_callback.lock() = Some(callback);
    }
}

/// The request ID of a `POST`ed body, when that body is a request
///
/// Responses the client posts back also carry an `id`; those must not be
/// recorded, so only bodies with a `method` member count.
fn posted_request_id(body: &[u8]) -> Option<RequestId> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    if value.get("method").is_none() {
        return None;
    }
    extract_request_id(&value)
}

fn extract_request_id(value: &serde_json::Value) -> Option<RequestId> {
    match value.get("id")? {
        serde_json::Value::Number(n) => n.as_i64().map(RequestId::Number),
        serde_json::Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}
