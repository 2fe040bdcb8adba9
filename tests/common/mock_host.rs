//! Mock merge host for testing
//!
//! These are test utilities - not all may be used in every test file but
//! are shared across the integration test suite.

#![allow(dead_code)]

use async_trait::async_trait;
use automerge_bot::error::{Error, Result};
use automerge_bot::platform::{CreateMergeRequest, MergeHost, MergeOptions, RepoContext};
use automerge_bot::types::{BranchDetail, CompareResult, CreatedMergeRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Call record for `compare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareCall {
    pub repository_id: String,
    pub from: String,
    pub to: String,
}

/// Call record for `branch_detail`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDetailCall {
    pub repository_id: String,
    pub branch_name: String,
}

/// Call record for `create_merge_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub repository_id: String,
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
}

/// Call record for `merge`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub repository_id: String,
    pub merge_request_id: u64,
    pub merge_message: String,
    pub merge_type: String,
    pub remove_source_branch: bool,
}

/// Simple mock merge host for testing
///
/// Manually implemented rather than generated, matching the rest of the
/// test toolkit.
///
/// Features:
/// - Auto-incrementing merge-request ids
/// - Call tracking for verification
/// - Configurable responses
/// - Error injection for failure path testing
/// - Optional compare delay for overlapping-check tests
pub struct MockMergeHost {
    next_mr_id: AtomicU64,
    // Configurable responses
    compare_response: Mutex<Option<CompareResult>>,
    branch_detail_responses: Mutex<HashMap<String, BranchDetail>>,
    create_response: Mutex<Option<CreatedMergeRequest>>,
    merge_response: Mutex<serde_json::Value>,
    compare_delay: Mutex<Option<Duration>>,
    // Call tracking
    compare_calls: Mutex<Vec<CompareCall>>,
    branch_detail_calls: Mutex<Vec<BranchDetailCall>>,
    create_calls: Mutex<Vec<CreateCall>>,
    merge_calls: Mutex<Vec<MergeCall>>,
    // Error injection
    error_on_compare: Mutex<Option<String>>,
    error_on_branch_detail: Mutex<Option<String>>,
    error_on_create: Mutex<Option<String>>,
    error_on_merge: Mutex<Option<String>>,
}

impl Default for MockMergeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMergeHost {
    /// Create a mock whose compare reports one commit (changes exist),
    /// creates auto-numbered merge requests, and merges successfully.
    pub fn new() -> Self {
        Self {
            next_mr_id: AtomicU64::new(1),
            compare_response: Mutex::new(None),
            branch_detail_responses: Mutex::new(HashMap::new()),
            create_response: Mutex::new(None),
            merge_response: Mutex::new(serde_json::json!({ "state": "merged" })),
            compare_delay: Mutex::new(None),
            compare_calls: Mutex::new(Vec::new()),
            branch_detail_calls: Mutex::new(Vec::new()),
            create_calls: Mutex::new(Vec::new()),
            merge_calls: Mutex::new(Vec::new()),
            error_on_compare: Mutex::new(None),
            error_on_branch_detail: Mutex::new(None),
            error_on_create: Mutex::new(None),
            error_on_merge: Mutex::new(None),
        }
    }

    // === Response configuration ===

    /// Set the compare response (e.g. empty for a no-op run)
    pub fn set_compare_response(&self, compare: CompareResult) {
        *self.compare_response.lock().unwrap() = Some(compare);
    }

    /// Set the branch-detail response for a specific branch
    pub fn set_branch_detail_response(&self, branch: &str, detail: BranchDetail) {
        self.branch_detail_responses
            .lock()
            .unwrap()
            .insert(branch.to_string(), detail);
    }

    /// Set the create response (overrides auto-numbering)
    pub fn set_create_response(&self, created: CreatedMergeRequest) {
        *self.create_response.lock().unwrap() = Some(created);
    }

    /// Set the merge response payload
    pub fn set_merge_response(&self, response: serde_json::Value) {
        *self.merge_response.lock().unwrap() = response;
    }

    /// Delay compare calls, holding runs open so checks can overlap
    pub fn set_compare_delay(&self, delay: Duration) {
        *self.compare_delay.lock().unwrap() = Some(delay);
    }

    // === Error injection ===

    /// Make `compare` return an error
    pub fn fail_compare(&self, msg: &str) {
        *self.error_on_compare.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `branch_detail` return an error
    pub fn fail_branch_detail(&self, msg: &str) {
        *self.error_on_branch_detail.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_merge_request` return an error carrying remote detail
    pub fn fail_create(&self, msg: &str) {
        *self.error_on_create.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `merge` return an error carrying remote detail
    pub fn fail_merge(&self, msg: &str) {
        *self.error_on_merge.lock().unwrap() = Some(msg.to_string());
    }

    // === Call verification ===

    pub fn compare_calls(&self) -> Vec<CompareCall> {
        self.compare_calls.lock().unwrap().clone()
    }

    pub fn branch_detail_calls(&self) -> Vec<BranchDetailCall> {
        self.branch_detail_calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> Vec<CreateCall> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.lock().unwrap().len()
    }

    pub fn merge_call_count(&self) -> usize {
        self.merge_calls.lock().unwrap().len()
    }

    /// Total remote calls of any kind
    pub fn total_call_count(&self) -> usize {
        self.compare_calls.lock().unwrap().len()
            + self.branch_detail_calls.lock().unwrap().len()
            + self.create_calls.lock().unwrap().len()
            + self.merge_calls.lock().unwrap().len()
    }

    /// Assert a merge request was created for a source/target pair
    pub fn assert_create_called(&self, source: &str, target: &str) {
        let calls = self.create_calls();
        assert!(
            calls
                .iter()
                .any(|c| c.source_branch == source && c.target_branch == target),
            "Expected create_merge_request({source}, {target}) but got: {calls:?}"
        );
    }

    /// Assert `merge` was NOT called
    pub fn assert_merge_not_called(&self) {
        let calls = self.merge_calls();
        assert!(
            calls.is_empty(),
            "Expected merge not to be called but it was: {calls:?}"
        );
    }
}

#[async_trait]
impl MergeHost for MockMergeHost {
    async fn compare(
        &self,
        ctx: &RepoContext<'_>,
        from: &str,
        to: &str,
    ) -> Result<CompareResult> {
        self.compare_calls.lock().unwrap().push(CompareCall {
            repository_id: ctx.repository_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });

        let delay = *self.compare_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(msg) = self.error_on_compare.lock().unwrap().as_ref() {
            return Err(Error::Codeup(msg.clone()));
        }

        Ok(self
            .compare_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| {
                // Default: one commit ahead, so the pipeline proceeds
                serde_json::from_value(serde_json::json!({
                    "commits": [{ "id": "abc123", "title": "feat: add thing" }],
                    "diffs": [{ "newPath": "src/lib.rs" }]
                }))
                .unwrap()
            }))
    }

    async fn branch_detail(
        &self,
        ctx: &RepoContext<'_>,
        branch_name: &str,
    ) -> Result<BranchDetail> {
        self.branch_detail_calls
            .lock()
            .unwrap()
            .push(BranchDetailCall {
                repository_id: ctx.repository_id.to_string(),
                branch_name: branch_name.to_string(),
            });

        if let Some(msg) = self.error_on_branch_detail.lock().unwrap().as_ref() {
            return Err(Error::Codeup(msg.clone()));
        }

        Ok(self
            .branch_detail_responses
            .lock()
            .unwrap()
            .get(branch_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_merge_request(
        &self,
        ctx: &RepoContext<'_>,
        req: &CreateMergeRequest,
    ) -> Result<CreatedMergeRequest> {
        self.create_calls.lock().unwrap().push(CreateCall {
            repository_id: ctx.repository_id.to_string(),
            source_branch: req.source_branch.clone(),
            target_branch: req.target_branch.clone(),
            title: req.title.clone(),
            description: req.description.clone(),
        });

        if let Some(msg) = self.error_on_create.lock().unwrap().as_ref() {
            return Err(Error::Codeup(msg.clone()));
        }

        if let Some(created) = self.create_response.lock().unwrap().clone() {
            return Ok(created);
        }

        let id = self.next_mr_id.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedMergeRequest {
            local_id: Some(id),
            detail_url: Some(format!("https://codeup.example.com/mr/{id}")),
            title: Some(req.title.clone()),
            state: Some("opened".to_string()),
        })
    }

    async fn merge(
        &self,
        ctx: &RepoContext<'_>,
        merge_request_id: u64,
        opts: &MergeOptions,
    ) -> Result<serde_json::Value> {
        self.merge_calls.lock().unwrap().push(MergeCall {
            repository_id: ctx.repository_id.to_string(),
            merge_request_id,
            merge_message: opts.merge_message.clone(),
            merge_type: opts.merge_type.clone(),
            remove_source_branch: opts.remove_source_branch,
        });

        if let Some(msg) = self.error_on_merge.lock().unwrap().as_ref() {
            return Err(Error::Codeup(msg.clone()));
        }

        Ok(self.merge_response.lock().unwrap().clone())
    }
}
