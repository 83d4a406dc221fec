//! The server session: registries, tasks, and reserved-method routing.
//!
//! [`Server`] wraps a `SessionCore<ServerRole>` and wires the feature
//! sub-systems into its dispatch tables: the initialize handshake, `ping`,
//! the `tools/*`, `resources/*`, `prompts/*`, and `tasks/*` surfaces, and
//! the capability-gated list-changed notifications.
//!
//! Handler closures capture a [`WeakSession`], never the session itself,
//! so the handler table cannot keep its own session alive.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use loommcp_core::{PeerInfo, ServerRole, SessionConfig, SessionCore, WeakSession};
use loommcp_protocol::capabilities::{
    PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};
use loommcp_protocol::methods;
use loommcp_protocol::types::{
    CallToolParams, CreateTaskResult, GetPromptParams, GetTaskParams, Implementation,
    InitializeParams, InitializeResult, ListPromptsParams, ListResourcesParams, ListTasksParams,
    ListToolsParams, ReadResourceParams, TaskPayloadResult,
};
use loommcp_protocol::{Error, PROTOCOL_VERSION, Result};
use loommcp_transport::Transport;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::{
    NotifyChangedFn, PromptHandlerFn, PromptRegistry, ResourceHandlerFn, ResourceRegistry,
    TemplateHandlerFn, ToolHandlerFn, ToolRegistry,
};
use crate::tasks::TaskManager;
use loommcp_protocol::types::{Prompt, Resource, ResourceTemplate, Tool};

/// Builder for [`Server`]
#[derive(Debug, Clone)]
pub struct ServerBuilder {
    info: Implementation,
    instructions: Option<String>,
    list_changed: bool,
    resources_subscribe: bool,
    session: SessionConfig,
    task_cleanup_interval: Duration,
    task_default_ttl: Option<u64>,
}

impl ServerBuilder {
    /// Start building a server identified as `name`/`version`
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            instructions: None,
            list_changed: true,
            resources_subscribe: false,
            session: SessionConfig::default(),
            task_cleanup_interval: Duration::from_secs(60),
            task_default_ttl: None,
        }
    }

    /// Usage instructions surfaced to the model after initialize
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Whether to advertise and emit list-changed notifications (default: on)
    pub fn with_list_changed(mut self, enabled: bool) -> Self {
        self.list_changed = enabled;
        self
    }

    /// Advertise the resources `subscribe` bit
    pub fn with_resources_subscribe(mut self, enabled: bool) -> Self {
        self.resources_subscribe = enabled;
        self
    }

    /// Override session tuning
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// How often expired tasks are swept (default: 60 seconds)
    pub fn with_task_cleanup_interval(mut self, interval: Duration) -> Self {
        self.task_cleanup_interval = interval;
        self
    }

    /// Default TTL applied to tasks created without one
    pub fn with_task_default_ttl(mut self, ttl_seconds: u64) -> Self {
        self.task_default_ttl = Some(ttl_seconds);
        self
    }

    /// Bind `transport` and assemble the server
    pub fn build(self, transport: Box<dyn Transport>) -> Server {
        let capabilities = ServerCapabilities {
            experimental: Some(
                [("tasks".to_string(), json!({}))]
                    .into_iter()
                    .collect(),
            ),
            logging: None,
            prompts: Some(PromptsCapability {
                list_changed: Some(self.list_changed),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(self.resources_subscribe),
                list_changed: Some(self.list_changed),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(self.list_changed),
            }),
        };

        let session = SessionCore::<ServerRole>::new(transport, self.session);
        let tasks = match self.task_default_ttl {
            Some(ttl) => Arc::new(TaskManager::with_default_ttl(self.task_cleanup_interval, ttl)),
            None => Arc::new(TaskManager::new(self.task_cleanup_interval)),
        };

        let server = Server {
            session,
            tools: Arc::new(ToolRegistry::new()),
            resources: Arc::new(ResourceRegistry::new()),
            prompts: Arc::new(PromptRegistry::new()),
            tasks,
            info: self.info,
            instructions: self.instructions,
            capabilities,
            shutdown: CancellationToken::new(),
            cleanup_task: Mutex::new(None),
        };
        server.wire_handlers();
        server.wire_list_changed();
        server
    }
}

/// An MCP server session over one transport
pub struct Server {
    session: SessionCore<ServerRole>,
    tools: Arc<ToolRegistry>,
    resources: Arc<ResourceRegistry>,
    prompts: Arc<PromptRegistry>,
    tasks: Arc<TaskManager>,
    info: Implementation,
    instructions: Option<String>,
    capabilities: ServerCapabilities,
    shutdown: CancellationToken,
    cleanup_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Server {
    /// Start building a server
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(name, version)
    }

    /// Connect the transport and start serving
    ///
    /// # Errors
    ///
    /// Propagates the transport's connect failure.
    pub async fn connect(&self) -> Result<()> {
        self.session.connect().await?;
        let cleanup = self.tasks.spawn_cleanup(self.shutdown.clone());
        *self.cleanup_task.lock() = Some(cleanup);
        Ok(())
    }

    /// Tear the session down
    ///
    /// # Errors
    ///
    /// Never fails today; mirrors the session's signature.
    pub async fn disconnect(&self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        self.session.disconnect().await
    }

    /// Register a tool
    ///
    /// # Errors
    ///
    /// Rejects duplicate names and invalid input schemas.
    pub fn register_tool(&self, tool: Tool, handler: ToolHandlerFn) -> Result<()> {
        self.tools.register(tool, handler)
    }

    /// Register a static resource
    ///
    /// # Errors
    ///
    /// Rejects duplicate URIs.
    pub fn register_resource(&self, resource: Resource, handler: ResourceHandlerFn) -> Result<()> {
        self.resources.register(resource, handler)
    }

    /// Register a parameterized resource family
    ///
    /// # Errors
    ///
    /// Rejects unparseable templates and duplicates.
    pub fn register_resource_template(
        &self,
        template: ResourceTemplate,
        handler: TemplateHandlerFn,
    ) -> Result<()> {
        self.resources.register_template(template, handler)
    }

    /// Register a prompt
    ///
    /// # Errors
    ///
    /// Rejects duplicate names.
    pub fn register_prompt(&self, prompt: Prompt, handler: PromptHandlerFn) -> Result<()> {
        self.prompts.register(prompt, handler)
    }

    /// The tool registry
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// The resource registry
    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// The prompt registry
    pub fn prompts(&self) -> &Arc<PromptRegistry> {
        &self.prompts
    }

    /// The task manager
    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    /// The underlying session
    pub fn session(&self) -> &SessionCore<ServerRole> {
        &self.session
    }

    /// Ask the client for an LLM completion (`sampling/createMessage`)
    ///
    /// # Errors
    ///
    /// Fails when the client advertised no sampling capability, rejected
    /// the request, or the request itself failed.
    pub async fn create_message(
        &self,
        params: loommcp_protocol::types::CreateMessageParams,
    ) -> Result<loommcp_protocol::types::CreateMessageResult> {
        let raw = self
            .session
            .request(
                methods::SAMPLING_CREATE_MESSAGE,
                Some(serde_json::to_value(params)?),
                None,
            )
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Ask the client for user input (`elicitation/create`)
    ///
    /// Form mode resolves with the user's terminal action; URL mode
    /// resolves `pending` immediately, and the server later reports the
    /// out-of-band outcome via [`complete_elicitation`].
    ///
    /// [`complete_elicitation`]: Self::complete_elicitation
    ///
    /// # Errors
    ///
    /// Fails when the client rejected the request or it timed out.
    pub async fn elicit(
        &self,
        params: loommcp_protocol::types::ElicitParams,
    ) -> Result<loommcp_protocol::types::ElicitResult> {
        let raw = self
            .session
            .request(
                methods::ELICITATION_CREATE,
                Some(serde_json::to_value(params)?),
                None,
            )
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Resolve a URL-mode elicitation (`notifications/elicitation/complete`)
    ///
    /// # Errors
    ///
    /// Fails when the notification cannot be sent.
    pub async fn complete_elicitation(
        &self,
        params: loommcp_protocol::types::ElicitationCompleteParams,
    ) -> Result<()> {
        self.session
            .send_notification(
                methods::NOTIFICATION_ELICITATION_COMPLETE,
                Some(serde_json::to_value(params)?),
            )
            .await
    }

    /// Fetch the client's advertised roots (`roots/list`)
    ///
    /// # Errors
    ///
    /// Fails when the client advertised no roots capability or the request
    /// failed.
    pub async fn list_roots(&self) -> Result<loommcp_protocol::types::ListRootsResult> {
        let raw = self.session.request(methods::ROOTS_LIST, None, None).await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// The capabilities this server advertises
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    fn wire_handlers(&self) {
        self.wire_initialize();
        self.wire_ping();
        self.wire_tools();
        self.wire_resources();
        self.wire_prompts();
        self.wire_tasks();
    }

    fn wire_initialize(&self) {
        let weak = self.session.downgrade();
        let info = self.info.clone();
        let capabilities = self.capabilities.clone();
        let instructions = self.instructions.clone();

        self.session.install_request_handler(
            methods::INITIALIZE,
            Arc::new(move |request, _ctx| {
                let weak = weak.clone();
                let info = info.clone();
                let capabilities = capabilities.clone();
                let instructions = instructions.clone();
                async move {
                    let session = weak.upgrade().ok_or(Error::Shutdown)?;
                    let params: InitializeParams = parse_params(request.params)?;
                    if params.protocol_version != PROTOCOL_VERSION {
                        warn!(
                            offered = %params.protocol_version,
                            "rejecting initialize with unsupported protocol version"
                        );
                        return Err(Error::VersionMismatch {
                            ours: PROTOCOL_VERSION.to_string(),
                            theirs: params.protocol_version,
                        });
                    }

                    session.set_peer_info(PeerInfo {
                        implementation: params.client_info,
                        capabilities: params.capabilities,
                        protocol_version: params.protocol_version,
                    })?;
                    debug!("initialize handshake accepted");

                    let result = InitializeResult {
                        protocol_version: PROTOCOL_VERSION.to_string(),
                        capabilities,
                        server_info: info,
                        instructions,
                    };
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        let weak = self.session.downgrade();
        self.session.install_notification_handler(
            methods::NOTIFICATION_INITIALIZED,
            Arc::new(move |_notification| {
                let weak = weak.clone();
                async move {
                    if let Some(session) = weak.upgrade() {
                        session.mark_initialized();
                        debug!("session marked initialized");
                    }
                }
                .boxed()
            }),
        );
    }

    fn wire_ping(&self) {
        self.session.install_request_handler(
            methods::PING,
            Arc::new(|_request, _ctx| async move { Ok(json!({})) }.boxed()),
        );
    }

    fn wire_tools(&self) {
        let tools = self.tools.clone();
        self.session.install_request_handler(
            methods::TOOLS_LIST,
            Arc::new(move |request, _ctx| {
                let tools = tools.clone();
                async move {
                    let params: ListToolsParams = parse_params(request.params)?;
                    let result = tools.list_paginated(params.cursor.as_deref())?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        let tools = self.tools.clone();
        self.session.install_request_handler(
            methods::TOOLS_CALL,
            Arc::new(move |request, ctx| {
                let tools = tools.clone();
                async move {
                    let params: CallToolParams = parse_params(request.params)?;
                    let result = tools.invoke(&params.name, params.arguments, ctx).await;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );
    }

    fn wire_resources(&self) {
        let resources = self.resources.clone();
        self.session.install_request_handler(
            methods::RESOURCES_LIST,
            Arc::new(move |request, _ctx| {
                let resources = resources.clone();
                async move {
                    let params: ListResourcesParams = parse_params(request.params)?;
                    let result = resources.list_paginated(params.cursor.as_deref())?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        let resources = self.resources.clone();
        self.session.install_request_handler(
            methods::RESOURCES_TEMPLATES_LIST,
            Arc::new(move |request, _ctx| {
                let resources = resources.clone();
                async move {
                    let params: ListResourcesParams = parse_params(request.params)?;
                    let result = resources.list_templates_paginated(params.cursor.as_deref())?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        let resources = self.resources.clone();
        self.session.install_request_handler(
            methods::RESOURCES_READ,
            Arc::new(move |request, ctx| {
                let resources = resources.clone();
                async move {
                    let params: ReadResourceParams = parse_params(request.params)?;
                    let result = resources.read(&params.uri, ctx).await?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );
    }

    fn wire_prompts(&self) {
        let prompts = self.prompts.clone();
        self.session.install_request_handler(
            methods::PROMPTS_LIST,
            Arc::new(move |request, _ctx| {
                let prompts = prompts.clone();
                async move {
                    let params: ListPromptsParams = parse_params(request.params)?;
                    let result = prompts.list_paginated(params.cursor.as_deref())?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        let prompts = self.prompts.clone();
        self.session.install_request_handler(
            methods::PROMPTS_GET,
            Arc::new(move |request, ctx| {
                let prompts = prompts.clone();
                async move {
                    let params: GetPromptParams = parse_params(request.params)?;
                    let result = prompts.get(&params.name, params.arguments, ctx).await?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );
    }

    fn wire_tasks(&self) {
        #[derive(Debug, Deserialize)]
        struct CreateTaskParams {
            ttl: Option<u64>,
            #[serde(rename = "pollInterval")]
            poll_interval: Option<u64>,
        }

        #[derive(Debug, Deserialize)]
        struct CancelTaskParams {
            #[serde(rename = "taskId")]
            task_id: String,
            reason: Option<String>,
        }

        let tasks = self.tasks.clone();
        self.session.install_request_handler(
            methods::TASKS_CREATE,
            Arc::new(move |request, _ctx| {
                let tasks = tasks.clone();
                async move {
                    let params: CreateTaskParams = parse_params(request.params)?;
                    let task = tasks.create(params.ttl, params.poll_interval);
                    Ok(serde_json::to_value(CreateTaskResult { task })?)
                }
                .boxed()
            }),
        );

        let tasks = self.tasks.clone();
        self.session.install_request_handler(
            methods::TASKS_GET,
            Arc::new(move |request, _ctx| {
                let tasks = tasks.clone();
                async move {
                    let params: GetTaskParams = parse_params(request.params)?;
                    let task = tasks.get(&params.task_id)?;
                    Ok(serde_json::to_value(task)?)
                }
                .boxed()
            }),
        );

        let tasks = self.tasks.clone();
        self.session.install_request_handler(
            methods::TASKS_RESULT,
            Arc::new(move |request, _ctx| {
                let tasks = tasks.clone();
                async move {
                    let params: GetTaskParams = parse_params(request.params)?;
                    let result = tasks.result(&params.task_id)?;
                    Ok(serde_json::to_value(TaskPayloadResult { result })?)
                }
                .boxed()
            }),
        );

        let tasks = self.tasks.clone();
        self.session.install_request_handler(
            methods::TASKS_LIST,
            Arc::new(move |request, _ctx| {
                let tasks = tasks.clone();
                async move {
                    let params: ListTasksParams = parse_params(request.params)?;
                    let result = tasks.list_paginated(params.cursor.as_deref())?;
                    Ok(serde_json::to_value(result)?)
                }
                .boxed()
            }),
        );

        let tasks = self.tasks.clone();
        self.session.install_request_handler(
            methods::TASKS_CANCEL,
            Arc::new(move |request, _ctx| {
                let tasks = tasks.clone();
                async move {
                    let params: CancelTaskParams = parse_params(request.params)?;
                    tasks.cancel(&params.task_id, params.reason)?;
                    let task = tasks.get(&params.task_id)?;
                    Ok(serde_json::to_value(task)?)
                }
                .boxed()
            }),
        );
    }

    /// Install the gated list-changed callbacks on the registries
    ///
    /// Each family's callback is installed only when the advertised
    /// capabilities carry its `listChanged` bit, and emission additionally
    /// waits for a completed handshake; a registry mutated before
    /// initialize stays silent.
    fn wire_list_changed(&self) {
        if self.capabilities.wants_tools_list_changed() {
            self.tools.set_notify_changed(make_list_changed_notifier(
                self.session.downgrade(),
                methods::NOTIFICATION_TOOLS_LIST_CHANGED,
            ));
        }
        if self.capabilities.wants_resources_list_changed() {
            self.resources.set_notify_changed(make_list_changed_notifier(
                self.session.downgrade(),
                methods::NOTIFICATION_RESOURCES_LIST_CHANGED,
            ));
        }
        if self.capabilities.wants_prompts_list_changed() {
            self.prompts.set_notify_changed(make_list_changed_notifier(
                self.session.downgrade(),
                methods::NOTIFICATION_PROMPTS_LIST_CHANGED,
            ));
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("info", &self.info)
            .field("tools", &self.tools)
            .field("resources", &self.resources)
            .field("prompts", &self.prompts)
            .finish_non_exhaustive()
    }
}

fn make_list_changed_notifier(
    weak: WeakSession<ServerRole>,
    method: &'static str,
) -> NotifyChangedFn {
    Arc::new(move || {
        let Some(session) = weak.upgrade() else { return };
        // Capability gating: nothing is emitted before the handshake has
        // recorded the peer.
        if session.peer_info().is_none() {
            return;
        }
        tokio::spawn(async move {
            if let Err(e) = session.send_notification(method, None).await {
                warn!("failed to send {method}: {e}");
            }
        });
    })
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T> {
    let value = params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(value).map_err(|e| Error::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loommcp_protocol::types::CallToolResult;
    use loommcp_transport::MemoryTransport;

    fn echo_tool() -> Tool {
        Tool {
            name: "echo".into(),
            description: Some("Echo a message back".into()),
            input_schema: json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }),
            output_schema: None,
            annotations: None,
            meta: None,
        }
    }

    fn echo_handler() -> ToolHandlerFn {
        Arc::new(|_name, args, _ctx| {
            async move {
                let message = args["message"].as_str().unwrap_or_default().to_string();
                Ok(CallToolResult::text(message))
            }
            .boxed()
        })
    }

    #[test]
    fn builder_assembles_capabilities() {
        let (end, _other) = MemoryTransport::pair();
        let server = Server::builder("test-server", "1.0").build(Box::new(end));
        let caps = server.capabilities();
        assert!(caps.tools.is_some());
        assert!(caps.resources.is_some());
        assert!(caps.prompts.is_some());
        assert_eq!(caps.tools.unwrap().list_changed, Some(true));
        assert!(caps.experimental.as_ref().unwrap().contains_key("tasks"));
    }

    #[test]
    fn list_changed_can_be_disabled() {
        let (end, _other) = MemoryTransport::pair();
        let server = Server::builder("test-server", "1.0")
            .with_list_changed(false)
            .build(Box::new(end));
        assert_eq!(server.capabilities().tools.unwrap().list_changed, Some(false));
    }

    #[tokio::test]
    async fn tool_registration_via_server() {
        let (end, _other) = MemoryTransport::pair();
        let server = Server::builder("test-server", "1.0").build(Box::new(end));
        server.register_tool(echo_tool(), echo_handler()).unwrap();
        assert!(server.tools().has("echo"));
        assert!(server.register_tool(echo_tool(), echo_handler()).is_err());
    }
}
