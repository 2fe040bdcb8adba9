//! In-memory mock task store for testing

#![allow(dead_code)]

use async_trait::async_trait;
use automerge_bot::error::{Error, Result};
use automerge_bot::store::TaskStore;
use automerge_bot::types::{
    ExecutionLog, ExecutionType, LogPage, LogStatus, NewLogEntry, NewTask, Task, TaskPatch,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// In-memory task store with call tracking and error injection.
///
/// Unlike the production file store this keeps everything behind plain
/// mutexes so tests can inspect state synchronously.
#[derive(Default)]
pub struct MockTaskStore {
    tasks: Mutex<Vec<Task>>,
    logs: Mutex<Vec<ExecutionLog>>,
    next_task_id: Mutex<i64>,
    next_log_id: Mutex<i64>,
    due_calls: Mutex<Vec<DateTime<Utc>>>,
    /// When set, `due_tasks` ignores next_run and returns these task ids
    due_override: Mutex<Option<Vec<i64>>>,
    error_on_due: Mutex<Option<String>>,
    error_on_append_log: Mutex<Option<String>>,
}

impl MockTaskStore {
    pub fn new() -> Self {
        Self {
            next_task_id: Mutex::new(1),
            next_log_id: Mutex::new(1),
            ..Self::default()
        }
    }

    /// Insert a task directly, returning it with an assigned id
    pub fn add_task(&self, mut task: Task) -> Task {
        let mut next = self.next_task_id.lock().unwrap();
        task.id = *next;
        *next += 1;
        self.tasks.lock().unwrap().push(task.clone());
        task
    }

    /// Snapshot of one task
    pub fn get_task(&self, id: i64) -> Option<Task> {
        self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    /// Snapshot of all log rows, oldest first
    pub fn all_logs(&self) -> Vec<ExecutionLog> {
        self.logs.lock().unwrap().clone()
    }

    /// Log rows for one task name, oldest first
    pub fn logs_named(&self, task_name: &str) -> Vec<ExecutionLog> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.task_name == task_name)
            .cloned()
            .collect()
    }

    /// Times `due_tasks` was called with
    pub fn due_calls(&self) -> Vec<DateTime<Utc>> {
        self.due_calls.lock().unwrap().clone()
    }

    /// Force `due_tasks` to always return these task ids, ignoring
    /// next_run, so a task stays "due" across overlapping checks
    pub fn set_due_override(&self, ids: Vec<i64>) {
        *self.due_override.lock().unwrap() = Some(ids);
    }

    /// Make `due_tasks` return an error
    pub fn fail_due_tasks(&self, msg: &str) {
        *self.error_on_due.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `append_log` return an error
    pub fn fail_append_log(&self, msg: &str) {
        *self.error_on_append_log.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl TaskStore for MockTaskStore {
    async fn all_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn enabled_tasks(&self) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.enabled)
            .cloned()
            .collect())
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        self.due_calls.lock().unwrap().push(now);

        if let Some(msg) = self.error_on_due.lock().unwrap().as_ref() {
            return Err(Error::Store(msg.clone()));
        }

        let tasks = self.tasks.lock().unwrap();
        if let Some(ids) = self.due_override.lock().unwrap().as_ref() {
            return Ok(tasks
                .iter()
                .filter(|t| t.enabled && ids.contains(&t.id))
                .cloned()
                .collect());
        }

        Ok(tasks.iter().filter(|t| t.is_due(now)).cloned().collect())
    }

    async fn task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.get_task(id))
    }

    async fn create_task(&self, new: NewTask) -> Result<i64> {
        let now = Utc::now();
        let task = self.add_task(Task {
            id: 0,
            name: new.name,
            source_branch: new.source_branch,
            target_branch: new.target_branch,
            interval_minutes: new.interval_minutes,
            enabled: new.enabled.unwrap_or(true),
            repository_id: new.repository_id,
            repository_name: new.repository_name,
            execute_user: new.execute_user,
            last_run: None,
            next_run: Some(now + Duration::minutes(new.interval_minutes)),
            created_at: now,
            updated_at: now,
        });
        Ok(task.id)
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        if let Some(enabled) = patch.enabled {
            task.enabled = enabled;
        }
        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(interval_minutes) = patch.interval_minutes {
            task.interval_minutes = interval_minutes;
        }
        task.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        Ok(tasks.len() != before)
    }

    async fn update_run_times(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Err(Error::TaskNotFound(id));
        };
        task.last_run = Some(last_run);
        task.next_run = Some(next_run);
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<i64> {
        if let Some(msg) = self.error_on_append_log.lock().unwrap().as_ref() {
            return Err(Error::Store(msg.clone()));
        }

        let request_data = entry
            .request_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let response_data = entry
            .response_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut next = self.next_log_id.lock().unwrap();
        let id = *next;
        *next += 1;

        self.logs.lock().unwrap().push(ExecutionLog {
            id,
            task_name: entry.task_name,
            status: entry.status.unwrap_or(LogStatus::Info),
            message: entry.message,
            merge_request_id: entry.merge_request_id,
            merge_request_detail_url: entry.merge_request_detail_url,
            operator: entry.operator,
            request_data,
            response_data,
            error_details: entry.error_details,
            execution_type: entry.execution_type.unwrap_or(ExecutionType::Auto),
            executed_at: Utc::now(),
        });
        Ok(id)
    }

    async fn logs_for_task(&self, task_name: &str, limit: usize) -> Result<Vec<ExecutionLog>> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|l| l.task_name == task_name)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn logs_page(&self, page: usize, page_size: usize) -> Result<LogPage> {
        let logs = self.logs.lock().unwrap();
        let page = page.max(1);
        let total = logs.len();
        let entries = logs
            .iter()
            .rev()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();
        Ok(LogPage {
            entries,
            total,
            page,
            page_size,
        })
    }
}
