//! Resource registry: static URIs plus URI-template families.
//!
//! A read resolves against the static registrations first, then against the
//! templates in registration order; the first template that matches wins and
//! its handler receives the captured variables. Unlike tools, resource
//! failures are protocol-level errors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use loommcp_core::RequestContext;
use loommcp_protocol::pagination::{self, DEFAULT_PAGE_SIZE};
use loommcp_protocol::types::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceResult, Resource,
    ResourceTemplate,
};
use loommcp_protocol::{Error, Result};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::tools::NotifyChangedFn;
use super::uri_template::UriTemplate;

/// Handler for a static resource, invoked with the URI
pub type ResourceHandlerFn =
    Arc<dyn Fn(String, RequestContext) -> BoxFuture<'static, Result<ReadResourceResult>> + Send + Sync>;

/// Handler for a template family, invoked with the URI and captured variables
pub type TemplateHandlerFn = Arc<
    dyn Fn(String, HashMap<String, String>, RequestContext) -> BoxFuture<'static, Result<ReadResourceResult>>
        + Send
        + Sync,
>;

struct StaticRegistration {
    resource: Resource,
    handler: ResourceHandlerFn,
}

struct TemplateRegistration {
    template: ResourceTemplate,
    matcher: UriTemplate,
    handler: TemplateHandlerFn,
}

/// Registry of readable resources, keyed by URI
#[derive(Default)]
pub struct ResourceRegistry {
    statics: RwLock<BTreeMap<String, Arc<StaticRegistration>>>,
    templates: RwLock<Vec<Arc<TemplateRegistration>>>,
    notify: Mutex<Option<NotifyChangedFn>>,
}

impl ResourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a static resource; exactly one handler per URI
    ///
    /// # Errors
    ///
    /// Rejects duplicate URIs.
    pub fn register(&self, resource: Resource, handler: ResourceHandlerFn) -> Result<()> {
        let uri = resource.uri.clone();
        {
            let mut statics = self.statics.write();
            if statics.contains_key(&uri) {
                return Err(Error::InvalidParams(format!(
                    "resource already registered: {uri}"
                )));
            }
            statics.insert(uri.clone(), Arc::new(StaticRegistration { resource, handler }));
        }
        debug!(%uri, "resource registered");
        self.notify_changed();
        Ok(())
    }

    /// Register a parameterized resource family
    ///
    /// # Errors
    ///
    /// Rejects templates that fail to parse and duplicate template strings.
    pub fn register_template(
        &self,
        template: ResourceTemplate,
        handler: TemplateHandlerFn,
    ) -> Result<()> {
        let matcher = UriTemplate::parse(&template.uri_template)?;
        {
            let mut templates = self.templates.write();
            if templates
                .iter()
                .any(|t| t.template.uri_template == template.uri_template)
            {
                return Err(Error::InvalidParams(format!(
                    "resource template already registered: {}",
                    template.uri_template
                )));
            }
            templates.push(Arc::new(TemplateRegistration {
                template,
                matcher,
                handler,
            }));
        }
        self.notify_changed();
        Ok(())
    }

    /// Remove a static resource; returns whether it existed
    pub fn unregister(&self, uri: &str) -> bool {
        let removed = self.statics.write().remove(uri).is_some();
        if removed {
            self.notify_changed();
        }
        removed
    }

    /// Whether `uri` resolves, statically or through a template
    pub fn has(&self, uri: &str) -> bool {
        self.statics.read().contains_key(uri)
            || self
                .templates
                .read()
                .iter()
                .any(|t| t.matcher.match_uri(uri).is_some())
    }

    /// All static resource definitions, in URI order
    pub fn list(&self) -> Vec<Resource> {
        self.statics
            .read()
            .values()
            .map(|entry| entry.resource.clone())
            .collect()
    }

    /// All template definitions, in registration order
    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        self.templates
            .read()
            .iter()
            .map(|entry| entry.template.clone())
            .collect()
    }

    /// One page of static resources
    ///
    /// # Errors
    ///
    /// Rejects cursors this registry never minted.
    pub fn list_paginated(&self, cursor: Option<&str>) -> Result<ListResourcesResult> {
        let resources = self.list();
        let page = pagination::paginate(&resources, cursor, DEFAULT_PAGE_SIZE)
            .ok_or_else(|| Error::InvalidParams("invalid cursor".into()))?;
        Ok(ListResourcesResult {
            resources: page.items,
            next_cursor: page.next_cursor,
            total: Some(page.total),
        })
    }

    /// One page of resource templates
    ///
    /// # Errors
    ///
    /// Rejects cursors this registry never minted.
    pub fn list_templates_paginated(
        &self,
        cursor: Option<&str>,
    ) -> Result<ListResourceTemplatesResult> {
        let templates = self.list_templates();
        let page = pagination::paginate(&templates, cursor, DEFAULT_PAGE_SIZE)
            .ok_or_else(|| Error::InvalidParams("invalid cursor".into()))?;
        Ok(ListResourceTemplatesResult {
            resource_templates: page.items,
            next_cursor: page.next_cursor,
        })
    }

    /// Read a resource by URI
    ///
    /// # Errors
    ///
    /// Fails with invalid-params when nothing matches, or with the
    /// handler's own error.
    pub async fn read(&self, uri: &str, ctx: RequestContext) -> Result<ReadResourceResult> {
        let static_hit = self.statics.read().get(uri).cloned();
        if let Some(registration) = static_hit {
            return (registration.handler)(uri.to_string(), ctx).await;
        }

        let matched = self.templates.read().iter().find_map(|registration| {
            registration
                .matcher
                .match_uri(uri)
                .map(|captured| (registration.clone(), captured))
        });

        match matched {
            Some((registration, captured)) => {
                (registration.handler)(uri.to_string(), captured, ctx).await
            }
            None => Err(Error::InvalidParams(format!("unknown resource: {uri}"))),
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

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("static", &self.statics.read().len())
            .field("templates", &self.templates.read().len())
            .finish_non_exhaustive()
    }
}
