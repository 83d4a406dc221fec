//! Prompt registry: named templates that render to ordered message lists.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use loommcp_core::RequestContext;
use loommcp_protocol::pagination::{self, DEFAULT_PAGE_SIZE};
use loommcp_protocol::types::{GetPromptResult, ListPromptsResult, Prompt};
use loommcp_protocol::{Error, Result};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::tools::NotifyChangedFn;

/// Handler invoked with the raw argument map
pub type PromptHandlerFn = Arc<
    dyn Fn(HashMap<String, String>, RequestContext) -> BoxFuture<'static, Result<GetPromptResult>>
        + Send
        + Sync,
>;

struct PromptRegistration {
    prompt: Prompt,
    handler: PromptHandlerFn,
}

/// Registry of prompt templates, keyed by name
#[derive(Default)]
pub struct PromptRegistry {
    entries: RwLock<BTreeMap<String, Arc<PromptRegistration>>>,
    notify: Mutex<Option<NotifyChangedFn>>,
}

impl PromptRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt
    ///
    /// # Errors
    ///
    /// Rejects duplicate names.
    pub fn register(&self, prompt: Prompt, handler: PromptHandlerFn) -> Result<()> {
        let name = prompt.name.clone();
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&name) {
                return Err(Error::InvalidParams(format!(
                    "prompt already registered: {name}"
                )));
            }
            entries.insert(name.clone(), Arc::new(PromptRegistration { prompt, handler }));
        }
        debug!(prompt = %name, "prompt registered");
        self.notify_changed();
        Ok(())
    }

    /// Remove a prompt; returns whether it existed
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.entries.write().remove(name).is_some();
        if removed {
            self.notify_changed();
        }
        removed
    }

    /// Whether `name` is registered
    pub fn has(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// All prompt definitions, in name order
    pub fn list(&self) -> Vec<Prompt> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.prompt.clone())
            .collect()
    }

    /// One page of prompt definitions
    ///
    /// # Errors
    ///
    /// Rejects cursors this registry never minted.
    pub fn list_paginated(&self, cursor: Option<&str>) -> Result<ListPromptsResult> {
        let prompts = self.list();
        let page = pagination::paginate(&prompts, cursor, DEFAULT_PAGE_SIZE)
            .ok_or_else(|| Error::InvalidParams("invalid cursor".into()))?;
        Ok(ListPromptsResult {
            prompts: page.items,
            next_cursor: page.next_cursor,
            total: Some(page.total),
        })
    }

    /// Render a prompt by name
    ///
    /// Required arguments are checked before the handler runs; a missing one
    /// is an invalid-params error.
    ///
    /// # Errors
    ///
    /// Fails on unknown names, missing required arguments, or the handler's
    /// own error.
    pub async fn get(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
        ctx: RequestContext,
    ) -> Result<GetPromptResult> {
        let registration = self
            .entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidParams(format!("unknown prompt: {name}")))?;

        let arguments = arguments.unwrap_or_default();
        if let Some(declared) = &registration.prompt.arguments {
            for argument in declared.iter().filter(|a| a.required) {
                if !arguments.contains_key(&argument.name) {
                    return Err(Error::InvalidParams(format!(
                        "missing required argument '{}' for prompt '{}'",
                        argument.name, name
                    )));
                }
            }
        }

        (registration.handler)(arguments, ctx).await
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

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRegistry")
            .field("prompts", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
