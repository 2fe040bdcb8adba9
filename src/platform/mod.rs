//! Remote merge service client
//!
//! Provides a unified interface for the three remote operations the
//! pipeline performs (compare, create merge request, merge) plus the
//! branch-detail lookup used for title enrichment.

mod codeup;

pub use codeup::CodeupHost;

use crate::error::Result;
use crate::types::{BranchDetail, CompareResult, CreatedMergeRequest};
use async_trait::async_trait;

/// Per-call addressing for the remote service.
///
/// Calls are parameterized rather than baking credentials into the client,
/// so one client instance serves every task and the pipeline can check
/// credential presence itself before any network traffic.
#[derive(Debug, Clone, Copy)]
pub struct RepoContext<'a> {
    pub token: &'a str,
    pub organization_id: &'a str,
    pub repository_id: &'a str,
}

/// Parameters for creating a merge request
#[derive(Debug, Clone)]
pub struct CreateMergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
}

/// Parameters for executing a merge
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub merge_message: String,
    /// Merge semantics, e.g. "no-fast-forward"
    pub merge_type: String,
    pub remove_source_branch: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            merge_message: String::new(),
            merge_type: "no-fast-forward".to_string(),
            remove_source_branch: false,
        }
    }
}

/// Merge host trait for remote merge-request operations
///
/// This trait abstracts the code-hosting service so the pipeline and the
/// scheduler can be driven against a mock in tests.
#[async_trait]
pub trait MergeHost: Send + Sync {
    /// Compare two refs, returning the commits and file diffs between them
    async fn compare(
        &self,
        ctx: &RepoContext<'_>,
        from: &str,
        to: &str,
    ) -> Result<CompareResult>;

    /// Fetch a branch's detail (latest commit metadata)
    async fn branch_detail(
        &self,
        ctx: &RepoContext<'_>,
        branch_name: &str,
    ) -> Result<BranchDetail>;

    /// Create a merge request from source to target
    async fn create_merge_request(
        &self,
        ctx: &RepoContext<'_>,
        req: &CreateMergeRequest,
    ) -> Result<CreatedMergeRequest>;

    /// Merge a previously created merge request
    async fn merge(
        &self,
        ctx: &RepoContext<'_>,
        merge_request_id: u64,
        opts: &MergeOptions,
    ) -> Result<serde_json::Value>;
}
