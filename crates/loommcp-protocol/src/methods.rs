//! MCP method name constants.
//!
//! The `RESERVED` set is handled inside the session layer and never reaches
//! user-installed request or notification handlers.

/// `initialize`
pub const INITIALIZE: &str = "initialize";
/// `ping`
pub const PING: &str = "ping";
/// `notifications/initialized`
pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
/// `notifications/cancelled`
pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";
/// `notifications/progress`
pub const NOTIFICATION_PROGRESS: &str = "notifications/progress";
/// `notifications/tools/list_changed`
pub const NOTIFICATION_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
/// `notifications/resources/list_changed`
pub const NOTIFICATION_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
/// `notifications/prompts/list_changed`
pub const NOTIFICATION_PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
/// `notifications/roots/list_changed`
pub const NOTIFICATION_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
/// `notifications/elicitation/complete`
pub const NOTIFICATION_ELICITATION_COMPLETE: &str = "notifications/elicitation/complete";

/// `tools/list`
pub const TOOLS_LIST: &str = "tools/list";
/// `tools/call`
pub const TOOLS_CALL: &str = "tools/call";
/// `resources/list`
pub const RESOURCES_LIST: &str = "resources/list";
/// `resources/templates/list`
pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
/// `resources/read`
pub const RESOURCES_READ: &str = "resources/read";
/// `prompts/list`
pub const PROMPTS_LIST: &str = "prompts/list";
/// `prompts/get`
pub const PROMPTS_GET: &str = "prompts/get";
/// `roots/list`
pub const ROOTS_LIST: &str = "roots/list";
/// `sampling/createMessage`
pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
/// `elicitation/create`
pub const ELICITATION_CREATE: &str = "elicitation/create";

/// `tasks/create`
pub const TASKS_CREATE: &str = "tasks/create";
/// `tasks/get`
pub const TASKS_GET: &str = "tasks/get";
/// `tasks/result`
pub const TASKS_RESULT: &str = "tasks/result";
/// `tasks/list`
pub const TASKS_LIST: &str = "tasks/list";
/// `tasks/cancel`
pub const TASKS_CANCEL: &str = "tasks/cancel";

/// Methods the session layer intercepts before user dispatch
pub const RESERVED: &[&str] = &[
    INITIALIZE,
    NOTIFICATION_INITIALIZED,
    NOTIFICATION_CANCELLED,
    NOTIFICATION_PROGRESS,
    NOTIFICATION_TOOLS_LIST_CHANGED,
    NOTIFICATION_RESOURCES_LIST_CHANGED,
    NOTIFICATION_PROMPTS_LIST_CHANGED,
    NOTIFICATION_ELICITATION_COMPLETE,
    ROOTS_LIST,
    SAMPLING_CREATE_MESSAGE,
    ELICITATION_CREATE,
];

/// Whether the session layer handles `method` internally
pub fn is_reserved(method: &str) -> bool {
    RESERVED.contains(&method)
}
