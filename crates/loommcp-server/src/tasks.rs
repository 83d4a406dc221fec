//! Task lifecycle management for long-running operations.
//!
//! Tasks start `Working` and move through the lifecycle state machine;
//! `Completed`, `Failed`, and `Cancelled` are sinks. A task with a TTL that
//! elapses is first marked `Failed` with an "expired" message, then evicted
//! by a later cleanup pass; reads of evicted IDs report not-found. All
//! access is serialized by one mutex.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loommcp_protocol::pagination::{self, DEFAULT_PAGE_SIZE};
use loommcp_protocol::types::{ListTasksResult, Task, TaskStatus};
use loommcp_protocol::{Error, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredTask {
    task: Task,
    result: Option<serde_json::Value>,
}

/// Thread-safe task store with TTL expiry
#[derive(Debug)]
pub struct TaskManager {
    tasks: Mutex<BTreeMap<String, StoredTask>>,
    default_ttl: Option<u64>,
    cleanup_interval: Duration,
}

impl TaskManager {
    /// Create a manager sweeping for expiry every `cleanup_interval`
    pub fn new(cleanup_interval: Duration) -> Self {
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            default_ttl: None,
            cleanup_interval,
        }
    }

    /// Create a manager applying `default_ttl` to tasks created without one
    pub fn with_default_ttl(cleanup_interval: Duration, default_ttl: u64) -> Self {
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            default_ttl: Some(default_ttl),
            cleanup_interval,
        }
    }

    /// Create a task in `Working`; returns the full task record
    pub fn create(&self, ttl: Option<u64>, poll_interval: Option<u64>) -> Task {
        let now = Utc::now().to_rfc3339();
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            status: TaskStatus::Working,
            status_message: None,
            created_at: now.clone(),
            last_updated_at: now,
            ttl: ttl.or(self.default_ttl),
            poll_interval,
        };
        self.tasks.lock().insert(
            task.task_id.clone(),
            StoredTask {
                task: task.clone(),
                result: None,
            },
        );
        debug!(task_id = %task.task_id, "task created");
        task
    }

    /// Fetch a task by ID
    ///
    /// # Errors
    ///
    /// Fails with invalid-params for unknown or evicted IDs.
    pub fn get(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .lock()
            .get(task_id)
            .map(|stored| stored.task.clone())
            .ok_or_else(|| Error::InvalidParams(format!("task not found: {task_id}")))
    }

    /// Move a task to `status`, enforcing the lifecycle table
    ///
    /// # Errors
    ///
    /// Fails for unknown IDs and for transitions out of a terminal state.
    pub fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: Option<String>,
    ) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let stored = tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::InvalidParams(format!("task not found: {task_id}")))?;

        if !stored.task.status.can_transition_to(&status) {
            return Err(Error::InvalidParams(format!(
                "invalid task transition: {:?} -> {:?}",
                stored.task.status, status
            )));
        }

        stored.task.status = status;
        stored.task.status_message = message;
        stored.task.last_updated_at = Utc::now().to_rfc3339();
        Ok(())
    }

    /// Complete a task, storing its result value
    ///
    /// # Errors
    ///
    /// Fails for unknown IDs and when the task cannot reach `Completed`.
    pub fn set_result(&self, task_id: &str, result: serde_json::Value) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let stored = tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::InvalidParams(format!("task not found: {task_id}")))?;

        if !stored.task.status.can_transition_to(&TaskStatus::Completed) {
            return Err(Error::InvalidParams(format!(
                "cannot complete task in state {:?}",
                stored.task.status
            )));
        }

        stored.task.status = TaskStatus::Completed;
        stored.task.last_updated_at = Utc::now().to_rfc3339();
        stored.result = Some(result);
        Ok(())
    }

    /// The stored result of a completed task
    ///
    /// # Errors
    ///
    /// Fails for unknown IDs.
    pub fn result(&self, task_id: &str) -> Result<Option<serde_json::Value>> {
        self.tasks
            .lock()
            .get(task_id)
            .map(|stored| stored.result.clone())
            .ok_or_else(|| Error::InvalidParams(format!("task not found: {task_id}")))
    }

    /// Cancel a task
    ///
    /// # Errors
    ///
    /// Fails for unknown IDs and for tasks already terminal.
    pub fn cancel(&self, task_id: &str, reason: Option<String>) -> Result<()> {
        self.update_status(task_id, TaskStatus::Cancelled, reason)
    }

    /// One page of tasks, in ID order
    ///
    /// # Errors
    ///
    /// Rejects cursors this manager never minted.
    pub fn list_paginated(&self, cursor: Option<&str>) -> Result<ListTasksResult> {
        let tasks: Vec<Task> = self
            .tasks
            .lock()
            .values()
            .map(|stored| stored.task.clone())
            .collect();
        let page = pagination::paginate(&tasks, cursor, DEFAULT_PAGE_SIZE)
            .ok_or_else(|| Error::InvalidParams("invalid cursor".into()))?;
        Ok(ListTasksResult {
            tasks: page.items,
            next_cursor: page.next_cursor,
        })
    }

    /// Expire and evict tasks whose TTL has elapsed
    ///
    /// A non-terminal expired task is marked `Failed` with an "expired"
    /// message and kept for one more pass, so pollers can observe the
    /// failure; a terminal expired task is evicted.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        let mut tasks = self.tasks.lock();

        let expired: Vec<String> = tasks
            .iter()
            .filter(|(_, stored)| is_expired(&stored.task, now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            let Some(stored) = tasks.get_mut(&id) else { continue };
            if stored.task.status.is_terminal() {
                debug!(task_id = %id, "expired task evicted");
                tasks.remove(&id);
            } else {
                debug!(task_id = %id, "task expired");
                stored.task.status = TaskStatus::Failed;
                stored.task.status_message = Some("expired".to_string());
                stored.task.last_updated_at = now.to_rfc3339();
            }
        }
    }

    /// Spawn the periodic cleanup task, stopped by `shutdown`
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let interval = self.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        manager.cleanup_expired();
                    }
                }
            }
        })
    }

    /// Number of live tasks
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no task is live
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

fn is_expired(task: &Task, now: DateTime<Utc>) -> bool {
    let Some(ttl) = task.ttl else { return false };
    match DateTime::parse_from_rfc3339(&task.created_at) {
        Ok(created_at) => now >= created_at + chrono::Duration::seconds(ttl as i64),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> TaskManager {
        TaskManager::new(Duration::from_secs(60))
    }

    #[test]
    fn lifecycle_happy_path() {
        let tasks = manager();
        let task = tasks.create(Some(3600), None);
        assert_eq!(task.status, TaskStatus::Working);

        tasks
            .update_status(&task.task_id, TaskStatus::InputRequired, Some("need input".into()))
            .unwrap();
        assert_eq!(tasks.get(&task.task_id).unwrap().status, TaskStatus::InputRequired);

        tasks
            .update_status(&task.task_id, TaskStatus::Working, None)
            .unwrap();
        tasks.set_result(&task.task_id, json!({"answer": 42})).unwrap();

        let task = tasks.get(&task.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(tasks.result(&task.task_id).unwrap(), Some(json!({"answer": 42})));
    }

    #[test]
    fn terminal_states_never_change() {
        let tasks = manager();
        let task = tasks.create(None, None);
        tasks.set_result(&task.task_id, json!(null)).unwrap();

        for status in [
            TaskStatus::Working,
            TaskStatus::InputRequired,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            assert!(tasks.update_status(&task.task_id, status, None).is_err());
        }
        assert!(tasks.cancel(&task.task_id, None).is_err());
        assert!(tasks.set_result(&task.task_id, json!(1)).is_err());
    }

    #[test]
    fn cancel_from_working() {
        let tasks = manager();
        let task = tasks.create(None, None);
        tasks.cancel(&task.task_id, Some("caller went away".into())).unwrap();
        let task = tasks.get(&task.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.status_message.as_deref(), Some("caller went away"));
    }

    #[test]
    fn expiry_marks_failed_then_evicts() {
        let tasks = manager();
        let task = tasks.create(Some(0), None);

        // First pass: expired while Working, marked Failed.
        tasks.cleanup_expired();
        let observed = tasks.get(&task.task_id).unwrap();
        assert_eq!(observed.status, TaskStatus::Failed);
        assert_eq!(observed.status_message.as_deref(), Some("expired"));

        // Second pass: terminal and expired, evicted; reads now miss.
        tasks.cleanup_expired();
        assert!(tasks.get(&task.task_id).is_err());
        assert!(tasks.result(&task.task_id).is_err());
    }

    #[test]
    fn tasks_without_ttl_never_expire() {
        let tasks = manager();
        let task = tasks.create(None, None);
        tasks.cleanup_expired();
        tasks.cleanup_expired();
        assert!(tasks.get(&task.task_id).is_ok());
    }

    #[test]
    fn list_pagination_covers_everything() {
        let tasks = manager();
        let mut ids: Vec<String> = (0..75).map(|_| tasks.create(None, None).task_id).collect();
        ids.sort();

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = tasks.list_paginated(cursor.as_deref()).unwrap();
            seen.extend(page.tasks.into_iter().map(|t| t.task_id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn unknown_task_is_invalid_params() {
        let tasks = manager();
        assert!(tasks.get("nope").is_err());
        assert!(tasks.update_status("nope", TaskStatus::Completed, None).is_err());
        assert!(tasks.cancel("nope", None).is_err());
    }
}
