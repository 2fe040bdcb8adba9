//! Core types for automerge-bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured recurring source→target merge job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique task id
    pub id: i64,
    /// Human-readable task name (denormalized onto log rows)
    pub name: String,
    /// Branch merged from
    pub source_branch: String,
    /// Branch merged into
    pub target_branch: String,
    /// Minutes between runs (>= 1)
    pub interval_minutes: i64,
    /// Disabled tasks are never selected as due
    pub enabled: bool,
    /// Remote repository id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    /// Remote repository display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    /// Operator identity attached to manual runs (stored unmasked here,
    /// masked before it reaches a log row)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_user: Option<String>,
    /// When the task last ran (None before the first run)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// When the task is next due (recomputed after every run)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether this task is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run.is_some_and(|next| next <= now)
    }
}

/// Fields required to create a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub source_branch: String,
    pub target_branch: String,
    pub interval_minutes: i64,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub repository_id: Option<String>,
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub execute_user: Option<String>,
}

/// Partial update for a task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub interval_minutes: Option<i64>,
    pub enabled: Option<bool>,
    pub repository_id: Option<String>,
    pub repository_name: Option<String>,
    pub execute_user: Option<String>,
}

/// Status recorded on an execution log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
    Info,
    Conflict,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Info => write!(f, "info"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

/// How a run was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Timer-driven scheduler tick
    Auto,
    /// Admin-triggered run (HTTP execute endpoint or CLI)
    Manual,
}

impl std::fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// An immutable audit record of one pipeline run stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionLog {
    /// Log row id
    pub id: i64,
    /// Task name at the time of the run; not a live reference, so task
    /// deletion leaves log rows intact
    pub task_name: String,
    pub status: LogStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_request_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_request_detail_url: Option<String>,
    /// Operator identity, already masked by the writer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Serialized request payload, when captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<String>,
    /// Serialized response payload, when captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub execution_type: ExecutionType,
    pub executed_at: DateTime<Utc>,
}

/// Fields for appending a log row. The store assigns id and timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry {
    pub task_name: String,
    pub status: Option<LogStatus>,
    pub message: String,
    pub merge_request_id: Option<u64>,
    pub merge_request_detail_url: Option<String>,
    /// Must already be masked (see [`crate::store::mask_operator`])
    pub operator: Option<String>,
    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
    pub error_details: Option<String>,
    pub execution_type: Option<ExecutionType>,
}

/// One page of execution logs, newest first
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub entries: Vec<ExecutionLog>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

// =============================================================================
// Remote merge service payloads
// =============================================================================

/// A commit entry in a compare result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareCommit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
}

/// Result of comparing two refs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    #[serde(default)]
    pub commits: Vec<CompareCommit>,
    #[serde(default)]
    pub diffs: Vec<serde_json::Value>,
}

impl CompareResult {
    /// True when the comparison found nothing to merge
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.diffs.is_empty()
    }
}

/// Latest commit metadata on a branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCommit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
}

/// Detail of a remote branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub commit: Option<BranchCommit>,
}

/// Raw response from creating a merge request.
///
/// `local_id` may be absent even on an "ok" response; the pipeline treats
/// that as a fatal failure rather than trusting the status alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMergeRequest {
    #[serde(default)]
    pub local_id: Option<u64>,
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl CreatedMergeRequest {
    /// The usable merge-request id, if the response carried one
    pub const fn merge_request_id(&self) -> Option<u64> {
        self.local_id
    }
}

/// Identity of a merge request the pipeline created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequestRef {
    pub id: u64,
    pub detail_url: Option<String>,
}

// =============================================================================
// Run outcome
// =============================================================================

/// Terminal status of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Merge request created and merged
    Success,
    /// Fatal or partial failure (see logs for which)
    Failed,
    /// No changes between branches, nothing created
    Info,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// Structured result of one pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: RunStatus,
    pub task_id: i64,
    pub task_name: String,
    /// The merge request this run created, when it got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_request: Option<MergeRequestRef>,
    /// Remote merge result payload on full success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_result: Option<serde_json::Value>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub next_run: DateTime<Utc>,
}

impl RunOutcome {
    /// Whether the run completed the full compare→create→merge sequence
    pub const fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Success)
    }
}

/// Snapshot of the scheduler's state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    /// Seconds between due-task checks while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval_secs: Option<u64>,
}
