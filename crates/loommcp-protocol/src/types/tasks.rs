//! Experimental long-running task types (`tasks/*`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task lifecycle status
///
/// `Completed`, `Failed`, and `Cancelled` are terminal; a task never leaves
/// a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// The task is executing
    Working,
    /// The task is waiting on caller input
    InputRequired,
    /// The task finished successfully
    Completed,
    /// The task failed
    Failed,
    /// The task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the lifecycle state machine permits `self -> next`
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self != next
    }
}

/// A long-running task visible to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Human-readable status detail
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// RFC 3339 creation timestamp
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// RFC 3339 timestamp of the last status change
    #[serde(rename = "lastUpdatedAt")]
    pub last_updated_at: String,
    /// Seconds the task outlives its creation before expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Suggested polling interval in milliseconds
    #[serde(rename = "pollInterval", skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

/// `tasks/create` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResult {
    /// The freshly created task
    pub task: Task,
}

/// `tasks/get` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskParams {
    /// The task to fetch
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// `tasks/result` result: the stored payload of a completed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayloadResult {
    /// The value stored when the task completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// `tasks/list` parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTasksParams {
    /// Opaque pagination cursor from a previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `tasks/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksResult {
    /// Tasks on this page
    pub tasks: Vec<Task>,
    /// Cursor for the next page; absent on the last page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sinks() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Cancelled] {
            for next in [
                TaskStatus::Working,
                TaskStatus::InputRequired,
                TaskStatus::Completed,
                TaskStatus::Failed,
                TaskStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(&next));
            }
        }
    }

    #[test]
    fn working_transitions() {
        assert!(TaskStatus::Working.can_transition_to(&TaskStatus::InputRequired));
        assert!(TaskStatus::Working.can_transition_to(&TaskStatus::Completed));
        assert!(TaskStatus::Working.can_transition_to(&TaskStatus::Failed));
        assert!(TaskStatus::Working.can_transition_to(&TaskStatus::Cancelled));
        assert!(!TaskStatus::Working.can_transition_to(&TaskStatus::Working));
        assert!(TaskStatus::InputRequired.can_transition_to(&TaskStatus::Working));
    }

    #[test]
    fn status_serde_names() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InputRequired).unwrap(),
            serde_json::json!("inputRequired")
        );
    }
}
