//! Pipeline execution - effectful operations
//!
//! Runs exactly one merge attempt for one task: diff check → create merge
//! request → merge → result logging. Every exit path, including failures,
//! recomputes the task's next run time so a failing task keeps its cadence
//! instead of spinning or stalling.

use crate::config::Credentials;
use crate::error::Error;
use crate::notify::{MergeNotification, Notifier};
use crate::pipeline::plan::{
    check_preconditions, created_message, failure_message, has_changes, merge_message,
    merge_request_description, merge_request_title, next_run_after, partial_failure_message,
    success_message, NO_CHANGES_MESSAGE,
};
use crate::platform::{CreateMergeRequest, MergeHost, MergeOptions, RepoContext};
use crate::store::{mask_operator, TaskStore};
use crate::types::{
    ExecutionType, LogStatus, MergeRequestRef, NewLogEntry, RunOutcome, RunStatus, Task,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Collaborators for one pipeline run
#[derive(Clone, Copy)]
pub struct PipelineDeps<'a> {
    pub host: &'a dyn MergeHost,
    pub store: &'a dyn TaskStore,
    pub notifier: Option<&'a dyn Notifier>,
    pub credentials: &'a Credentials,
}

/// How a step failed, determining the run's terminal handling
#[derive(Debug)]
enum StepError {
    /// Missing token/org/repository id; no remote calls were attempted
    Config(String),
    /// Merge-request creation rejected, or an "ok" response without a
    /// usable id
    Create(String),
    /// The merge request exists but the merge was rejected; a dangling
    /// request needs manual attention
    Merge {
        merge_request: MergeRequestRef,
        detail: String,
    },
}

/// What the remote steps produced when none of them failed
enum StepsOutcome {
    /// Comparison found nothing to merge; no merge request was created
    NoChanges,
    /// Full compare→create→merge sequence completed
    Merged {
        merge_request: MergeRequestRef,
        merge_result: serde_json::Value,
    },
}

/// Perform one merge attempt for one task.
///
/// Never propagates an error: every failure is converted into log rows and
/// a `failed` outcome, so one task's fault cannot disturb its siblings in
/// the same scheduler tick.
pub async fn execute_auto_merge(
    task: &Task,
    deps: &PipelineDeps<'_>,
    execution_type: ExecutionType,
) -> RunOutcome {
    let started_at = Utc::now();
    let next_run = next_run_after(started_at, task.interval_minutes);

    info!(
        task = task.name,
        source = task.source_branch,
        target = task.target_branch,
        %execution_type,
        "starting auto-merge run"
    );

    let operator = match execution_type {
        ExecutionType::Manual => task.execute_user.as_deref().map(mask_operator),
        ExecutionType::Auto => None,
    };

    let outcome = match run_steps(task, deps, started_at, execution_type, operator.clone()).await
    {
        Ok(StepsOutcome::NoChanges) => {
            info!(task = task.name, "no changes between branches, skipping");
            append_log(
                deps,
                log_entry(task, execution_type, operator)
                    .with_status(LogStatus::Info)
                    .with_message(NO_CHANGES_MESSAGE.to_string()),
            )
            .await;

            RunOutcome {
                status: RunStatus::Info,
                task_id: task.id,
                task_name: task.name.clone(),
                merge_request: None,
                merge_result: None,
                error: None,
                executed_at: started_at,
                next_run,
            }
        }
        Ok(StepsOutcome::Merged {
            merge_request,
            merge_result,
        }) => {
            info!(
                task = task.name,
                merge_request_id = merge_request.id,
                "auto-merge run succeeded"
            );
            append_log(
                deps,
                log_entry(task, execution_type, operator)
                    .with_status(LogStatus::Success)
                    .with_message(success_message(merge_request.id))
                    .with_merge_request(&merge_request)
                    .with_response(merge_result.clone()),
            )
            .await;

            RunOutcome {
                status: RunStatus::Success,
                task_id: task.id,
                task_name: task.name.clone(),
                merge_request: Some(merge_request),
                merge_result: Some(merge_result),
                error: None,
                executed_at: started_at,
                next_run,
            }
        }
        Err(StepError::Config(detail)) | Err(StepError::Create(detail)) => {
            warn!(task = task.name, detail, "auto-merge run failed");
            append_log(
                deps,
                log_entry(task, execution_type, operator)
                    .with_status(LogStatus::Failed)
                    .with_message(failure_message(&detail))
                    .with_error(detail.clone()),
            )
            .await;

            RunOutcome {
                status: RunStatus::Failed,
                task_id: task.id,
                task_name: task.name.clone(),
                merge_request: None,
                merge_result: None,
                error: Some(detail),
                executed_at: started_at,
                next_run,
            }
        }
        Err(StepError::Merge {
            merge_request,
            detail,
        }) => {
            // Distinguishable from a full failure: the merge request exists
            // and the operator needs its id to resolve it manually.
            warn!(
                task = task.name,
                merge_request_id = merge_request.id,
                detail,
                "merge request created but merge failed"
            );
            append_log(
                deps,
                log_entry(task, execution_type, operator)
                    .with_status(LogStatus::Failed)
                    .with_message(partial_failure_message(&detail))
                    .with_merge_request(&merge_request)
                    .with_error(detail.clone()),
            )
            .await;

            RunOutcome {
                status: RunStatus::Failed,
                task_id: task.id,
                task_name: task.name.clone(),
                merge_request: Some(merge_request),
                merge_result: None,
                error: Some(format!("合并操作失败: {detail}")),
                executed_at: started_at,
                next_run,
            }
        }
    };

    // Unconditional: a processed task must never stay permanently due.
    if let Err(e) = deps
        .store
        .update_run_times(task.id, started_at, next_run)
        .await
    {
        warn!(task = task.name, error = %e, "failed to update task run times");
    }

    notify(deps, task, &outcome).await;

    outcome
}

/// Run the remote steps in order, converting each failure at its step
/// boundary into the kind that decides the run's terminal handling.
async fn run_steps(
    task: &Task,
    deps: &PipelineDeps<'_>,
    started_at: DateTime<Utc>,
    execution_type: ExecutionType,
    operator: Option<String>,
) -> Result<StepsOutcome, StepError> {
    let target = check_preconditions(task, deps.credentials).map_err(StepError::Config)?;
    let ctx = RepoContext {
        token: &target.token,
        organization_id: &target.organization_id,
        repository_id: &target.repository_id,
    };

    // Step 1: diff check (best-effort). A failed comparison is assumed to
    // mean changes exist; only a confirmed-empty diff short-circuits.
    match deps
        .host
        .compare(&ctx, &task.target_branch, &task.source_branch)
        .await
    {
        Ok(compare) if !has_changes(&compare) => return Ok(StepsOutcome::NoChanges),
        Ok(compare) => {
            debug!(
                task = task.name,
                commits = compare.commits.len(),
                "changes detected"
            );
        }
        Err(e) => {
            warn!(task = task.name, error = %e, "compare failed, assuming changes exist");
        }
    }

    // Step 2: source metadata enrichment (best-effort)
    let source_branch = match deps
        .host
        .branch_detail(&ctx, &task.source_branch)
        .await
    {
        Ok(detail) => Some(detail),
        Err(e) => {
            warn!(task = task.name, error = %e, "branch detail lookup failed, using default description");
            None
        }
    };

    // Step 3: create merge request (fatal on failure)
    let request = CreateMergeRequest {
        source_branch: task.source_branch.clone(),
        target_branch: task.target_branch.clone(),
        title: merge_request_title(task),
        description: merge_request_description(task, started_at, source_branch.as_ref()),
    };

    let created = deps
        .host
        .create_merge_request(&ctx, &request)
        .await
        .map_err(|e| StepError::Create(format!("创建合并请求失败: {}", remote_detail(&e))))?;

    let Some(id) = created.merge_request_id() else {
        return Err(StepError::Create(
            "创建合并请求成功但未返回有效的请求ID".to_string(),
        ));
    };
    let merge_request = MergeRequestRef {
        id,
        detail_url: created.detail_url.clone(),
    };

    // Checkpoint: the merge request now exists, and step 4 can fail
    // independently. The operator must be able to find it either way.
    append_log(
        deps,
        log_entry(task, execution_type, operator)
            .with_status(LogStatus::Success)
            .with_message(created_message(id))
            .with_merge_request(&merge_request)
            .with_request(serde_json::json!({
                "sourceBranch": request.source_branch,
                "targetBranch": request.target_branch,
                "title": request.title,
            })),
    )
    .await;

    // Step 4: execute merge (partial failure on rejection)
    let opts = MergeOptions {
        merge_message: merge_message(task),
        ..MergeOptions::default()
    };

    let merge_result = deps
        .host
        .merge(&ctx, id, &opts)
        .await
        .map_err(|e| StepError::Merge {
            merge_request: merge_request.clone(),
            detail: remote_detail(&e),
        })?;

    Ok(StepsOutcome::Merged {
        merge_request,
        merge_result,
    })
}

/// Remote error detail, verbatim where the service provided one
fn remote_detail(error: &Error) -> String {
    match error {
        Error::Codeup(detail) => detail.clone(),
        other => other.to_string(),
    }
}

fn log_entry(task: &Task, execution_type: ExecutionType, operator: Option<String>) -> NewLogEntry {
    NewLogEntry {
        task_name: task.name.clone(),
        execution_type: Some(execution_type),
        operator,
        ..NewLogEntry::default()
    }
}

/// Log writes are best-effort relative to the remote workflow: a failed
/// audit write is reported but does not abort a merge already in flight.
async fn append_log(deps: &PipelineDeps<'_>, entry: NewLogEntry) {
    if let Err(e) = deps.store.append_log(entry).await {
        warn!(error = %e, "failed to write execution log");
    }
}

async fn notify(deps: &PipelineDeps<'_>, task: &Task, outcome: &RunOutcome) {
    let Some(notifier) = deps.notifier else {
        return;
    };
    if outcome.status == RunStatus::Info {
        return;
    }

    let message = match (&outcome.error, &outcome.merge_request) {
        (Some(error), _) => error.clone(),
        (None, Some(mr)) => success_message(mr.id),
        (None, None) => String::new(),
    };

    let notification = MergeNotification {
        task_name: task.name.clone(),
        status: outcome.status,
        message,
        merge_request_id: outcome.merge_request.as_ref().map(|mr| mr.id),
        merge_request_url: outcome
            .merge_request
            .as_ref()
            .and_then(|mr| mr.detail_url.clone()),
        repository_name: task.repository_name.clone(),
        source_branch: task.source_branch.clone(),
        target_branch: task.target_branch.clone(),
    };

    if let Err(e) = notifier.notify(&notification).await {
        warn!(task = task.name, error = %e, "notification failed");
    }
}

// NewLogEntry builder helpers, local to the pipeline
trait LogEntryExt {
    fn with_status(self, status: LogStatus) -> Self;
    fn with_message(self, message: String) -> Self;
    fn with_merge_request(self, merge_request: &MergeRequestRef) -> Self;
    fn with_request(self, request: serde_json::Value) -> Self;
    fn with_response(self, response: serde_json::Value) -> Self;
    fn with_error(self, detail: String) -> Self;
}

impl LogEntryExt for NewLogEntry {
    fn with_status(mut self, status: LogStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }

    fn with_merge_request(mut self, merge_request: &MergeRequestRef) -> Self {
        self.merge_request_id = Some(merge_request.id);
        self.merge_request_detail_url = merge_request.detail_url.clone();
        self
    }

    fn with_request(mut self, request: serde_json::Value) -> Self {
        self.request_data = Some(request);
        self
    }

    fn with_response(mut self, response: serde_json::Value) -> Self {
        self.response_data = Some(response);
        self
    }

    fn with_error(mut self, detail: String) -> Self {
        self.error_details = Some(detail);
        self
    }
}
