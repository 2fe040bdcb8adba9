//! TOML-file persistence for tasks and execution logs.

use super::TaskStore;
use crate::error::{Error, Result};
use crate::types::{
    ExecutionLog, ExecutionType, LogPage, LogStatus, NewLogEntry, NewTask, Task, TaskPatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Filename for the store state
const STATE_FILE: &str = "automerge.toml";

/// Current state-file schema version
const STATE_VERSION: u32 = 1;

/// Whole-store state, serialized as one TOML document.
///
/// Scalar fields must stay ahead of the table arrays for TOML emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreState {
    version: u32,
    next_task_id: i64,
    next_log_id: i64,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    logs: Vec<ExecutionLog>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            version: STATE_VERSION,
            next_task_id: 1,
            next_log_id: 1,
            tasks: Vec::new(),
            logs: Vec::new(),
        }
    }
}

/// File-backed task store.
///
/// The whole state lives in one TOML file under the data directory and is
/// rewritten after every mutation. A mutex serializes concurrent pipeline
/// writers within the process.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

/// Path to the state file inside a data directory
pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE)
}

/// Load store state from disk.
///
/// Returns an empty state if the file doesn't exist.
fn load_state(path: &Path) -> Result<StoreState> {
    if !path.exists() {
        return Ok(StoreState::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Store(format!("failed to read {}: {e}", path.display())))?;

    let state: StoreState = toml::from_str(&content)
        .map_err(|e| Error::Store(format!("failed to parse {}: {e}", path.display())))?;

    Ok(state)
}

/// Save store state to disk, creating the data directory if needed.
fn save_state(path: &Path, state: &StoreState) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Store(format!("failed to create {}: {e}", dir.display())))?;
        }
    }

    let content = toml::to_string_pretty(state)
        .map_err(|e| Error::Store(format!("failed to serialize store state: {e}")))?;

    let content_with_header = format!(
        "# automerge-bot task and log state\n# Auto-generated - manual edits may be overwritten\n\n{content}"
    );

    fs::write(path, content_with_header)
        .map_err(|e| Error::Store(format!("failed to write {}: {e}", path.display())))?;

    Ok(())
}

impl FileStore {
    /// Open (or initialize) the store under the given data directory
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = state_path(data_dir);
        let state = load_state(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        save_state(&self.path, state)
    }
}

#[async_trait]
impl TaskStore for FileStore {
    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        let mut tasks = state.tasks.clone();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn enabled_tasks(&self) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        Ok(state.tasks.iter().filter(|t| t.enabled).cloned().collect())
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect())
    }

    async fn task(&self, id: i64) -> Result<Option<Task>> {
        let state = self.state.lock().await;
        Ok(state.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn create_task(&self, new: NewTask) -> Result<i64> {
        if new.interval_minutes < 1 {
            return Err(Error::Store(
                "interval_minutes must be at least 1".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let now = Utc::now();
        let id = state.next_task_id;
        state.next_task_id += 1;

        state.tasks.push(Task {
            id,
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

        self.persist(&state)?;
        Ok(id)
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };

        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(source_branch) = patch.source_branch {
            task.source_branch = source_branch;
        }
        if let Some(target_branch) = patch.target_branch {
            task.target_branch = target_branch;
        }
        if let Some(interval_minutes) = patch.interval_minutes {
            if interval_minutes < 1 {
                return Err(Error::Store(
                    "interval_minutes must be at least 1".to_string(),
                ));
            }
            task.interval_minutes = interval_minutes;
        }
        if let Some(enabled) = patch.enabled {
            task.enabled = enabled;
        }
        if let Some(repository_id) = patch.repository_id {
            task.repository_id = Some(repository_id);
        }
        if let Some(repository_name) = patch.repository_name {
            task.repository_name = Some(repository_name);
        }
        if let Some(execute_user) = patch.execute_user {
            task.execute_user = Some(execute_user);
        }
        task.updated_at = Utc::now();

        self.persist(&state)?;
        Ok(true)
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Ok(false);
        }
        // Log rows keep their denormalized task name and are untouched.
        self.persist(&state)?;
        Ok(true)
    }

    async fn update_run_times(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
            return Err(Error::TaskNotFound(id));
        };
        task.last_run = Some(last_run);
        task.next_run = Some(next_run);
        task.updated_at = Utc::now();
        self.persist(&state)?;
        Ok(())
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<i64> {
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

        let mut state = self.state.lock().await;
        let id = state.next_log_id;
        state.next_log_id += 1;

        state.logs.push(ExecutionLog {
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

        self.persist(&state)?;
        Ok(id)
    }

    async fn logs_for_task(&self, task_name: &str, limit: usize) -> Result<Vec<ExecutionLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .rev()
            .filter(|l| l.task_name == task_name)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn logs_page(&self, page: usize, page_size: usize) -> Result<LogPage> {
        let state = self.state.lock().await;
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total = state.logs.len();

        let entries = state
            .logs
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
