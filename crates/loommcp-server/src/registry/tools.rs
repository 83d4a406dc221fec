//! Tool registry: registration, schema-validated invocation, pagination.
//!
//! Tool failures are MCP-level results with `isError = true`, never JSON-RPC
//! errors: an unknown tool, a schema violation, and a handler failure all
//! come back as error results the model can read. JSON-RPC errors stay
//! reserved for protocol-level breakage.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use jsonschema::Validator;
use loommcp_core::RequestContext;
use loommcp_protocol::pagination::{self, DEFAULT_PAGE_SIZE};
use loommcp_protocol::types::{CallToolResult, ListToolsResult, Tool};
use loommcp_protocol::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};

/// Handler invoked with `(name, arguments, context)`
pub type ToolHandlerFn = Arc<
    dyn Fn(String, Value, RequestContext) -> BoxFuture<'static, Result<CallToolResult>>
        + Send
        + Sync,
>;

/// Callback the session installs to learn about registry changes
pub type NotifyChangedFn = Arc<dyn Fn() + Send + Sync>;

struct ToolRegistration {
    tool: Tool,
    handler: ToolHandlerFn,
    validator: Validator,
}

/// Registry of invocable tools, keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<BTreeMap<String, Arc<ToolRegistration>>>,
    notify: Mutex<Option<NotifyChangedFn>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; its input schema is compiled once, here
    ///
    /// # Errors
    ///
    /// Rejects duplicate names and input schemas that fail to compile.
    pub fn register(&self, tool: Tool, handler: ToolHandlerFn) -> Result<()> {
        let validator = jsonschema::validator_for(&tool.input_schema)
            .map_err(|e| Error::InvalidParams(format!("tool input schema invalid: {e}")))?;

        let name = tool.name.clone();
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&name) {
                return Err(Error::InvalidParams(format!(
                    "tool already registered: {name}"
                )));
            }
            entries.insert(
                name.clone(),
                Arc::new(ToolRegistration {
                    tool,
                    handler,
                    validator,
                }),
            );
        }

        debug!(tool = %name, "tool registered");
        self.notify_changed();
        Ok(())
    }

    /// Remove a tool; returns whether it existed
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.entries.write().remove(name).is_some();
        if removed {
            debug!(tool = %name, "tool unregistered");
            self.notify_changed();
        }
        removed
    }

    /// Whether `name` is registered
    pub fn has(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// All tool definitions, in name order
    pub fn list(&self) -> Vec<Tool> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.tool.clone())
            .collect()
    }

    /// One page of tool definitions
    ///
    /// # Errors
    ///
    /// Rejects cursors this registry never minted.
    pub fn list_paginated(&self, cursor: Option<&str>) -> Result<ListToolsResult> {
        let tools = self.list();
        let page = pagination::paginate(&tools, cursor, DEFAULT_PAGE_SIZE)
            .ok_or_else(|| Error::InvalidParams("invalid cursor".into()))?;
        Ok(ListToolsResult {
            tools: page.items,
            next_cursor: page.next_cursor,
            total: Some(page.total),
        })
    }

    /// Invoke a tool by name
    ///
    /// Never fails at the protocol level: lookup misses, argument schema
    /// violations, and handler failures all become `isError = true` results.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<Value>,
        ctx: RequestContext,
    ) -> CallToolResult {
        let registration = match self.entries.read().get(name) {
            Some(registration) => registration.clone(),
            None => {
                debug!(tool = %name, "call to unknown tool");
                return CallToolResult::error(format!("unknown tool: {name}"));
            }
        };

        let arguments = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let violations: Vec<String> = registration
            .validator
            .iter_errors(&arguments)
            .map(|e| format!("{}: {}", e.instance_path(), e))
            .collect();
        if !violations.is_empty() {
            debug!(tool = %name, "tool arguments failed schema validation");
            return CallToolResult::error(format!(
                "invalid arguments for tool '{}': {}",
                name,
                violations.join("; ")
            ));
        }

        let invocation = (registration.handler)(name.to_string(), arguments, ctx);
        match std::panic::AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(tool = %name, "tool handler failed: {err}");
                CallToolResult::error(format!("tool '{name}' failed: {err}"))
            }
            Err(_) => {
                warn!(tool = %name, "tool handler panicked");
                CallToolResult::error(format!("tool '{name}' failed internally"))
            }
        }
    }

    /// Install the change callback; the session gates it on capabilities
    pub fn set_notify_changed(&self, callback: NotifyChangedFn) {
        *self.notify.lock() = Some(callback);
    }

    fn notify_changed(&self) {
        if let Some(notify) = self.notify.lock().clone() {
            notify();
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
