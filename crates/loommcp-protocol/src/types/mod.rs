//! MCP data model: content blocks, feature types, and handshake shapes.

pub mod content;
pub mod core;
pub mod elicitation;
pub mod initialization;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tasks;
pub mod tools;

pub use content::{
    AudioContent, BlobResourceContents, ContentBlock, EmbeddedResource, ImageContent,
    ResourceContents, ResourceLink, TextContent, TextResourceContents, ToolResultContent,
    ToolUseContent,
};
pub use core::{
    Annotations, CancelledNotificationParams, Implementation, Meta, ProgressNotificationParams,
    ProgressToken, Role, progress_token_from_params,
};
pub use elicitation::{
    ElicitParams, ElicitResult, ElicitationAction, ElicitationCompleteParams, ElicitationSchema,
    FormElicitParams, PrimitiveSchema, UrlElicitParams,
};
pub use initialization::{InitializeParams, InitializeResult};
pub use prompts::{
    GetPromptParams, GetPromptResult, ListPromptsParams, ListPromptsResult, Prompt,
    PromptArgument, PromptMessage,
};
pub use resources::{
    ListResourceTemplatesResult, ListResourcesParams, ListResourcesResult, ReadResourceParams,
    ReadResourceResult, Resource, ResourceTemplate,
};
pub use roots::{ListRootsResult, Root};
pub use sampling::{
    CreateMessageParams, CreateMessageResult, ModelHint, ModelPreferences, SamplingMessage,
    StopReason,
};
pub use tasks::{
    CreateTaskResult, GetTaskParams, ListTasksParams, ListTasksResult, Task, TaskPayloadResult,
    TaskStatus,
};
pub use tools::{
    CallToolParams, CallToolResult, ListToolsParams, ListToolsResult, Tool, ToolAnnotations,
};
