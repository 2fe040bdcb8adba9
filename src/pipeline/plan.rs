//! Pipeline planning - pure functions for one merge attempt
//!
//! This module contains the pure, testable decisions of a run: precondition
//! checks, no-op detection, merge-request text building, and next-run
//! computation. No I/O happens here.

use crate::config::Credentials;
use crate::types::{BranchDetail, CompareResult, Task};
use chrono::{DateTime, Duration, Utc};

/// Log message for a run that found nothing to merge
pub const NO_CHANGES_MESSAGE: &str = "源分支与目标分支无差异，跳过本次合并";

/// Credentials and repository id resolved for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    pub token: String,
    pub organization_id: String,
    pub repository_id: String,
}

/// Check the fatal-if-missing preconditions before any remote call.
///
/// Returns the resolved run target, or the operator-facing reason the run
/// cannot proceed.
pub fn check_preconditions(
    task: &Task,
    credentials: &Credentials,
) -> Result<RunTarget, String> {
    let Some(token) = credentials.token.clone() else {
        return Err("缺少访问令牌，请检查环境变量 CODEUP_TOKEN".to_string());
    };
    let Some(organization_id) = credentials.organization_id.clone() else {
        return Err("缺少组织ID，请检查环境变量 CODEUP_ORG_ID".to_string());
    };
    let repository_id = match &task.repository_id {
        Some(id) if !id.trim().is_empty() => id.clone(),
        _ => return Err("任务缺少仓库ID".to_string()),
    };

    Ok(RunTarget {
        token,
        organization_id,
        repository_id,
    })
}

/// Whether a successful comparison found anything to merge
pub fn has_changes(compare: &CompareResult) -> bool {
    !compare.is_empty()
}

/// Default merge-request title
pub fn merge_request_title(task: &Task) -> String {
    format!(
        "[自动合并] {} -> {}",
        task.source_branch, task.target_branch
    )
}

/// Merge-request description, enriched with the source branch's latest
/// commit when that lookup succeeded.
pub fn merge_request_description(
    task: &Task,
    started_at: DateTime<Utc>,
    source_branch: Option<&BranchDetail>,
) -> String {
    let mut description = format!(
        "由自动合并任务 \"{}\" 创建\n执行时间: {}",
        task.name,
        started_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(commit) = source_branch.and_then(|b| b.commit.as_ref()) {
        let title = commit
            .title
            .as_deref()
            .or(commit.message.as_deref())
            .unwrap_or_default();
        if !title.is_empty() {
            let first_line = title.lines().next().unwrap_or(title);
            match commit.author_name.as_deref() {
                Some(author) if !author.is_empty() => {
                    description.push_str(&format!("\n源分支最新提交: {first_line} ({author})"));
                }
                _ => description.push_str(&format!("\n源分支最新提交: {first_line}")),
            }
        }
    }

    description
}

/// Commit message used when merging
pub fn merge_message(task: &Task) -> String {
    format!("自动合并: {} -> {}", task.source_branch, task.target_branch)
}

/// Log message for the merge-request-created checkpoint
pub fn created_message(merge_request_id: u64) -> String {
    format!("成功创建合并请求: {merge_request_id}")
}

/// Log message for a fully successful run
pub fn success_message(merge_request_id: u64) -> String {
    format!("自动合并完全成功，合并请求ID: {merge_request_id}")
}

/// Log message for a partial failure (request created, merge rejected)
pub fn partial_failure_message(detail: &str) -> String {
    format!("合并请求创建成功但合并失败: {detail}")
}

/// Log message for a fatal run failure
pub fn failure_message(detail: &str) -> String {
    format!("自动合并执行失败: {detail}")
}

/// Next run time after an attempt that started at `started_at`.
///
/// Computed from the run start, not its end, so slow runs don't drift the
/// cadence.
pub fn next_run_after(started_at: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    started_at + Duration::minutes(interval_minutes)
}
