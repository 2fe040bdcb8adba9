//! Task and execution-log storage
//!
//! The store is the only shared mutable resource in the system. All
//! scheduling-field mutations go through read → compute → write with
//! last-writer-wins semantics; nothing here takes cross-call locks.

mod file;

pub use file::FileStore;

use crate::error::Result;
use crate::types::{ExecutionLog, LogPage, NewLogEntry, NewTask, Task, TaskPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Task store trait
///
/// "Due now" takes the caller's clock reading so one consistent time source
/// covers both the due comparison and the eventual next-run write-back.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks, newest first
    async fn all_tasks(&self) -> Result<Vec<Task>>;

    /// Tasks with `enabled = true`
    async fn enabled_tasks(&self) -> Result<Vec<Task>>;

    /// Enabled tasks whose `next_run <= now`
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Look up one task by id
    async fn task(&self, id: i64) -> Result<Option<Task>>;

    /// Create a task with `next_run = now + interval`; returns its id
    async fn create_task(&self, new: NewTask) -> Result<i64>;

    /// Patch a task's fields; returns false when the id does not exist
    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<bool>;

    /// Delete a task. Log rows referencing it by name are left intact.
    async fn delete_task(&self, id: i64) -> Result<bool>;

    /// Update only the scheduling fields after a run
    async fn update_run_times(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<()>;

    /// Append an immutable log row; returns its id.
    /// The operator value must already be masked by the caller.
    async fn append_log(&self, entry: NewLogEntry) -> Result<i64>;

    /// Logs for one task name, newest first
    async fn logs_for_task(&self, task_name: &str, limit: usize) -> Result<Vec<ExecutionLog>>;

    /// One page of all logs, newest first (page is 1-based)
    async fn logs_page(&self, page: usize, page_size: usize) -> Result<LogPage>;
}

/// Mask an operator identity before it is persisted on a log row.
///
/// Values shorter than 8 characters pass through unchanged; longer values
/// keep the first 2 and last 6 characters with at most 10 stars between.
pub fn mask_operator(operator: &str) -> String {
    let chars: Vec<char> = operator.chars().collect();
    if chars.len() < 8 {
        return operator.to_string();
    }
    let start: String = chars[..2].iter().collect();
    let end: String = chars[chars.len() - 6..].iter().collect();
    let middle = "*".repeat((chars.len() - 8).min(10));
    format!("{start}{middle}{end}")
}
