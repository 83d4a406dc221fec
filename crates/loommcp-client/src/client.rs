//! The client session: handshake, typed operations, and server-initiated
//! request routing.
//!
//! Handler closures installed on the session capture a [`WeakSession`] and
//! an `Arc` of the client's feature state, never the session itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use loommcp_core::{
    ClientRole, PeerInfo, RequestOptions, SessionConfig, SessionCore, WeakSession,
};
use loommcp_protocol::capabilities::{ClientCapabilities, RootsCapability};
use loommcp_protocol::methods;
use loommcp_protocol::types::{
    CallToolParams, CallToolResult, CreateMessageParams, ElicitParams, ElicitResult,
    ElicitationCompleteParams, GetPromptParams, GetPromptResult, Implementation, InitializeParams,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, ReadResourceParams, ReadResourceResult, Root, Tool,
};
use loommcp_protocol::{Error, PROTOCOL_VERSION, RequestId, Result};
use loommcp_transport::Transport;
use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::elicitation::ElicitationRouter;
use crate::handlers::{ElicitationHandler, SamplingHandler, UrlElicitationHandler};
use crate::roots::RootsManager;
use crate::sampling::{self, SamplingConfig};

/// Builder for [`Client`]
pub struct ClientBuilder {
    info: Implementation,
    capabilities: ClientCapabilities,
    session: SessionConfig,
    sampling_config: SamplingConfig,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    elicitation_handler: Option<Arc<dyn ElicitationHandler>>,
    url_elicitation_handler: Option<Arc<dyn UrlElicitationHandler>>,
}

impl ClientBuilder {
    /// Start building a client identified as `name`/`version`
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            capabilities: ClientCapabilities::default(),
            session: SessionConfig::default(),
            sampling_config: SamplingConfig::default(),
            sampling_handler: None,
            elicitation_handler: None,
            url_elicitation_handler: None,
        }
    }

    /// Advertise roots support, with or without change notifications
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.capabilities.roots = Some(RootsCapability {
            list_changed: Some(list_changed),
        });
        self
    }

    /// Install the sampling handler and advertise the capability
    pub fn with_sampling_handler(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling_handler = Some(handler);
        self.capabilities.sampling = Some(Default::default());
        self
    }

    /// Install the form elicitation handler and advertise the capability
    pub fn with_elicitation_handler(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation_handler = Some(handler);
        self.capabilities.elicitation = Some(Default::default());
        self
    }

    /// Install the URL elicitation handler and advertise the capability
    pub fn with_url_elicitation_handler(
        mut self,
        handler: Arc<dyn UrlElicitationHandler>,
    ) -> Self {
        self.url_elicitation_handler = Some(handler);
        self.capabilities.elicitation = Some(Default::default());
        self
    }

    /// Attach an experimental capability under `key`
    pub fn with_experimental(mut self, key: impl Into<String>, value: Value) -> Self {
        self.capabilities
            .experimental
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Override session tuning
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Override the sampling loop bounds
    pub fn with_sampling_config(mut self, config: SamplingConfig) -> Self {
        self.sampling_config = config;
        self
    }

    /// Bind `transport` and assemble the client
    pub fn build(self, transport: Box<dyn Transport>) -> Client {
        let session = SessionCore::<ClientRole>::new(transport, self.session);
        let state = Arc::new(ClientState {
            info: self.info,
            capabilities: self.capabilities,
            sampling_config: self.sampling_config,
            sampling_handler: RwLock::new(self.sampling_handler),
            elicitation_handler: RwLock::new(self.elicitation_handler),
            url_elicitation_handler: RwLock::new(self.url_elicitation_handler),
            roots: RootsManager::new(),
            elicitations: ElicitationRouter::new(),
        });

        let client = Client { session, state };
        client.wire_handlers();
        client.wire_roots_changed();
        client
    }
}

struct ClientState {
    info: Implementation,
    capabilities: ClientCapabilities,
    sampling_config: SamplingConfig,
    sampling_handler: RwLock<Option<Arc<dyn SamplingHandler>>>,
    elicitation_handler: RwLock<Option<Arc<dyn ElicitationHandler>>>,
    url_elicitation_handler: RwLock<Option<Arc<dyn UrlElicitationHandler>>>,
    roots: RootsManager,
    elicitations: ElicitationRouter,
}

/// An MCP client session over one transport
pub struct Client {
    session: SessionCore<ClientRole>,
    state: Arc<ClientState>,
}

impl Client {
    /// Start building a client
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(name, version)
    }

    /// Connect the transport and start dispatching
    ///
    /// # Errors
    ///
    /// Propagates the transport's connect failure.
    pub async fn connect(&self) -> Result<()> {
        self.session.connect().await
    }

    /// Tear the session down
    ///
    /// # Errors
    ///
    /// Never fails today; mirrors the session's signature.
    pub async fn disconnect(&self) -> Result<()> {
        self.session.disconnect().await
    }

    /// Run the initialize handshake
    ///
    /// Sends `initialize`, verifies the exact protocol version match,
    /// records the peer, and emits `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Fails on version mismatch, malformed results, or transport failure.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.state.capabilities.clone(),
            client_info: self.state.info.clone(),
        };
        let raw = self
            .session
            .request(
                methods::INITIALIZE,
                Some(serde_json::to_value(params)?),
                None,
            )
            .await?;
        let result: InitializeResult = serde_json::from_value(raw)
            .map_err(|e| Error::Internal(format!("malformed initialize result: {e}")))?;

        if result.protocol_version != PROTOCOL_VERSION {
            return Err(Error::VersionMismatch {
                ours: PROTOCOL_VERSION.to_string(),
                theirs: result.protocol_version,
            });
        }

        self.session.set_peer_info(PeerInfo {
            implementation: result.server_info.clone(),
            capabilities: result.capabilities.clone(),
            protocol_version: result.protocol_version.clone(),
        })?;

        self.session
            .send_notification(methods::NOTIFICATION_INITIALIZED, None)
            .await?;
        self.session.mark_initialized();
        debug!(server = %result.server_info.name, "initialize handshake complete");
        Ok(result)
    }

    /// Whether the handshake has completed
    pub fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    /// One page of the server's tools
    ///
    /// # Errors
    ///
    /// Propagates request failure.
    pub async fn list_tools(&self, cursor: Option<String>) -> Result<ListToolsResult> {
        let params = cursor.map(|cursor| json!({ "cursor": cursor }));
        let raw = self.session.request(methods::TOOLS_LIST, params, None).await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Every tool, walking all pages
    ///
    /// # Errors
    ///
    /// Propagates request failure.
    pub async fn list_all_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.list_tools(cursor).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }
    }

    /// Invoke a tool on the server
    ///
    /// # Errors
    ///
    /// Propagates protocol-level failure; tool-level failure arrives as
    /// `is_error = true` in the result.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
    ) -> Result<CallToolResult> {
        self.call_tool_with_options(name, arguments, RequestOptions::default())
            .await
    }

    /// Invoke a tool with timeout/progress options
    ///
    /// # Errors
    ///
    /// Propagates protocol-level failure.
    pub async fn call_tool_with_options(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
        options: RequestOptions,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.into(),
            arguments,
        };
        let raw = self
            .session
            .request_with_options(
                methods::TOOLS_CALL,
                Some(serde_json::to_value(params)?),
                options,
            )
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// One page of the server's resources
    ///
    /// # Errors
    ///
    /// Propagates request failure.
    pub async fn list_resources(&self, cursor: Option<String>) -> Result<ListResourcesResult> {
        let params = cursor.map(|cursor| json!({ "cursor": cursor }));
        let raw = self
            .session
            .request(methods::RESOURCES_LIST, params, None)
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// One page of the server's resource templates
    ///
    /// # Errors
    ///
    /// Propagates request failure.
    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResourceTemplatesResult> {
        let params = cursor.map(|cursor| json!({ "cursor": cursor }));
        let raw = self
            .session
            .request(methods::RESOURCES_TEMPLATES_LIST, params, None)
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Read a resource by URI
    ///
    /// # Errors
    ///
    /// Propagates request failure, including unknown URIs.
    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<ReadResourceResult> {
        let params = ReadResourceParams { uri: uri.into() };
        let raw = self
            .session
            .request(
                methods::RESOURCES_READ,
                Some(serde_json::to_value(params)?),
                None,
            )
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// One page of the server's prompts
    ///
    /// # Errors
    ///
    /// Propagates request failure.
    pub async fn list_prompts(&self, cursor: Option<String>) -> Result<ListPromptsResult> {
        let params = cursor.map(|cursor| json!({ "cursor": cursor }));
        let raw = self
            .session
            .request(methods::PROMPTS_LIST, params, None)
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Render a prompt by name
    ///
    /// # Errors
    ///
    /// Propagates request failure, including missing required arguments.
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult> {
        let params = GetPromptParams {
            name: name.into(),
            arguments,
        };
        let raw = self
            .session
            .request(
                methods::PROMPTS_GET,
                Some(serde_json::to_value(params)?),
                None,
            )
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Liveness probe
    ///
    /// # Errors
    ///
    /// Propagates request failure.
    pub async fn ping(&self) -> Result<()> {
        self.session
            .request(methods::PING, None, Some(Duration::from_secs(10)))
            .await?;
        Ok(())
    }

    /// Cancel an in-flight request issued by this client
    ///
    /// # Errors
    ///
    /// Propagates notification send failure.
    pub async fn cancel_request(&self, id: &RequestId, reason: Option<String>) -> Result<()> {
        self.session.cancel_request(id, reason).await
    }

    /// Install or replace the sampling handler
    pub fn set_sampling_handler(&self, handler: Arc<dyn SamplingHandler>) {
        *self.state.sampling_handler.write() = Some(handler);
    }

    /// Install or replace the form elicitation handler
    pub fn set_elicitation_handler(&self, handler: Arc<dyn ElicitationHandler>) {
        *self.state.elicitation_handler.write() = Some(handler);
    }

    /// Install or replace the URL elicitation handler
    pub fn set_url_elicitation_handler(&self, handler: Arc<dyn UrlElicitationHandler>) {
        *self.state.url_elicitation_handler.write() = Some(handler);
    }

    /// Add a root the server may explore
    ///
    /// # Errors
    ///
    /// Rejects duplicate URIs.
    pub fn add_root(&self, root: Root) -> Result<()> {
        self.state.roots.add(root)
    }

    /// Remove a root by URI; returns whether it existed
    pub fn remove_root(&self, uri: &str) -> bool {
        self.state.roots.remove(uri)
    }

    /// The current root set
    pub fn roots(&self) -> Vec<Root> {
        self.state.roots.list().roots
    }

    /// Number of unresolved URL-mode elicitations
    pub fn pending_elicitations(&self) -> usize {
        self.state.elicitations.pending_count()
    }

    /// The underlying session
    pub fn session(&self) -> &SessionCore<ClientRole> {
        &self.session
    }

    fn wire_handlers(&self) {
        self.session.install_request_handler(
            methods::PING,
            Arc::new(|_request, _ctx| async move { Ok(json!({})) }.boxed()),
        );

        // roots/list
        let state = self.state.clone();
        self.session.install_request_handler(
            methods::ROOTS_LIST,
            Arc::new(move |_request, _ctx| {
                let state = state.clone();
                async move { Ok(serde_json::to_value(state.roots.list())?) }.boxed()
            }),
        );

        // sampling/createMessage, with the bounded tool-use loop
        let state = self.state.clone();
        self.session.install_request_handler(
            methods::SAMPLING_CREATE_MESSAGE,
            Arc::new(move |request, ctx| {
                let state = state.clone();
                async move {
                    let handler = state.sampling_handler.read().clone().ok_or_else(|| {
                        Error::MethodNotFound(methods::SAMPLING_CREATE_MESSAGE.to_string())
                    })?;
                    let params: CreateMessageParams =
                        serde_json::from_value(request.params.unwrap_or(Value::Null))
                            .map_err(|e| Error::InvalidParams(e.to_string()))?;
                    let result = sampling::run_sampling(
                        handler,
                        params,
                        ctx.peer().clone(),
                        state.sampling_config.clone(),
                    )
                    .await?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        // elicitation/create: form answers synchronously, URL answers pending
        let state = self.state.clone();
        self.session.install_request_handler(
            methods::ELICITATION_CREATE,
            Arc::new(move |request, _ctx| {
                let state = state.clone();
                async move {
                    let params: ElicitParams =
                        serde_json::from_value(request.params.unwrap_or(Value::Null))
                            .map_err(|e| Error::InvalidParams(e.to_string()))?;

                    match params {
                        ElicitParams::Form(form) => {
                            let handler =
                                state.elicitation_handler.read().clone().ok_or_else(|| {
                                    Error::MethodNotFound(methods::ELICITATION_CREATE.to_string())
                                })?;
                            let result = handler.elicit(form).await?;
                            Ok(serde_json::to_value(result)?)
                        }
                        ElicitParams::Url(url) => {
                            let handler = state
                                .url_elicitation_handler
                                .read()
                                .clone()
                                .ok_or_else(|| {
                                    Error::MethodNotFound(methods::ELICITATION_CREATE.to_string())
                                })?;
                            let elicitation_id = url.elicitation_id.clone();
                            handler.open_url(url).await?;

                            let continuation_handler = handler.clone();
                            let continuation_id = elicitation_id.clone();
                            state.elicitations.register(
                                elicitation_id,
                                Box::new(move |result: ElicitResult| {
                                    tokio::spawn(async move {
                                        continuation_handler
                                            .on_complete(&continuation_id, result)
                                            .await;
                                    });
                                }),
                            );
                            Ok(serde_json::to_value(ElicitResult::pending())?)
                        }
                    }
                }
                .boxed()
            }),
        );

        // notifications/elicitation/complete resolves pending URL flows
        let state = self.state.clone();
        self.session.install_notification_handler(
            methods::NOTIFICATION_ELICITATION_COMPLETE,
            Arc::new(move |notification| {
                let state = state.clone();
                async move {
                    let Some(params) = notification.params else {
                        warn!("elicitation completion without params");
                        return;
                    };
                    match serde_json::from_value::<ElicitationCompleteParams>(params) {
                        Ok(complete) => state.elicitations.complete(complete),
                        Err(_) => warn!("malformed elicitation completion"),
                    }
                }
                .boxed()
            }),
        );
    }

    fn wire_roots_changed(&self) {
        if !self.state.capabilities.wants_roots_list_changed() {
            return;
        }
        let weak: WeakSession<ClientRole> = self.session.downgrade();
        self.state.roots.set_notify_changed(Arc::new(move || {
            let Some(session) = weak.upgrade() else { return };
            if session.peer_info().is_none() {
                return;
            }
            tokio::spawn(async move {
                if let Err(e) = session
                    .send_notification(methods::NOTIFICATION_ROOTS_LIST_CHANGED, None)
                    .await
                {
                    warn!("failed to send roots list_changed: {e}");
                }
            });
        }));
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("info", &self.state.info)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
