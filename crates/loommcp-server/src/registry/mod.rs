//! Feature registries hosted by the server role.

pub mod prompts;
pub mod resources;
pub mod tools;
pub mod uri_template;

pub use prompts::{PromptHandlerFn, PromptRegistry};
pub use resources::{ResourceHandlerFn, ResourceRegistry, TemplateHandlerFn};
pub use tools::{NotifyChangedFn, ToolHandlerFn, ToolRegistry};
pub use uri_template::UriTemplate;
