//! # loommcp-server
//!
//! The server role of loommcp: tool, resource, and prompt registries with
//! schema-validated invocation and opaque-cursor pagination, an RFC 6570
//! (Level 1-2) URI template engine for parameterized resources, a task
//! manager with a lifecycle state machine and TTL expiry, and the
//! [`Server`] session that routes the `tools/*`, `resources/*`,
//! `prompts/*`, and `tasks/*` methods and emits capability-gated
//! list-changed notifications.

#![warn(missing_docs)]

pub mod registry;
pub mod server;
pub mod tasks;

pub use registry::{
    PromptHandlerFn, PromptRegistry, ResourceHandlerFn, ResourceRegistry, TemplateHandlerFn,
    ToolHandlerFn, ToolRegistry, UriTemplate,
};
pub use server::{Server, ServerBuilder};
pub use tasks::TaskManager;
