//! Codeup (Alibaba Cloud) merge host implementation

use crate::error::{Error, Result};
use crate::platform::{CreateMergeRequest, MergeHost, MergeOptions, RepoContext};
use crate::types::{BranchDetail, CompareResult, CreatedMergeRequest};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token header expected by the Codeup OpenAPI
const TOKEN_HEADER: &str = "x-yunxiao-token";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Codeup host using reqwest
pub struct CodeupHost {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChangeRequestPayload {
    create_from: &'static str,
    source_branch: String,
    source_project_id: String,
    target_branch: String,
    target_project_id: String,
    title: String,
    description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MergePayload {
    merge_message: String,
    merge_type: String,
    remove_source_branch: bool,
}

/// Error body shape returned by the Codeup OpenAPI
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CodeupErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl CodeupErrorBody {
    /// Remote error detail, preferring the most specific field
    fn detail(self) -> String {
        self.error_description
            .or(self.error_message)
            .or(self.message)
            .unwrap_or_else(|| "未知错误".to_string())
    }
}

impl CodeupHost {
    /// Create a new Codeup host against the given API base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Codeup(format!("failed to create HTTP client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { client, base_url })
    }

    fn repo_url(&self, ctx: &RepoContext<'_>, path: &str) -> String {
        format!(
            "{}/oapi/v1/codeup/organizations/{}/repositories/{}{}",
            self.base_url, ctx.organization_id, ctx.repository_id, path
        )
    }

    /// Convert a non-success response into [`Error::Codeup`] carrying the
    /// remote error detail verbatim.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: CodeupErrorBody = response.json().await.unwrap_or_default();
        Err(Error::Codeup(format!("{} ({status})", body.detail())))
    }
}

#[async_trait]
impl MergeHost for CodeupHost {
    async fn compare(
        &self,
        ctx: &RepoContext<'_>,
        from: &str,
        to: &str,
    ) -> Result<CompareResult> {
        debug!(from, to, repo = ctx.repository_id, "comparing refs");
        let url = self.repo_url(ctx, "/compares");

        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, ctx.token)
            .query(&[("from", from), ("to", to), ("straight", "false")])
            .send()
            .await?;

        let compare: CompareResult = Self::check_status(response).await?.json().await?;
        debug!(
            commits = compare.commits.len(),
            diffs = compare.diffs.len(),
            "compared refs"
        );
        Ok(compare)
    }

    async fn branch_detail(
        &self,
        ctx: &RepoContext<'_>,
        branch_name: &str,
    ) -> Result<BranchDetail> {
        debug!(branch_name, repo = ctx.repository_id, "fetching branch detail");
        let url = self.repo_url(
            ctx,
            &format!("/branches/{}", urlencoding::encode(branch_name)),
        );

        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, ctx.token)
            .send()
            .await?;

        let detail: BranchDetail = Self::check_status(response).await?.json().await?;
        debug!(branch_name, "fetched branch detail");
        Ok(detail)
    }

    async fn create_merge_request(
        &self,
        ctx: &RepoContext<'_>,
        req: &CreateMergeRequest,
    ) -> Result<CreatedMergeRequest> {
        debug!(
            source = req.source_branch,
            target = req.target_branch,
            repo = ctx.repository_id,
            "creating merge request"
        );
        let url = self.repo_url(ctx, "/changeRequests");

        let payload = CreateChangeRequestPayload {
            create_from: "WEB",
            source_branch: req.source_branch.clone(),
            source_project_id: ctx.repository_id.to_string(),
            target_branch: req.target_branch.clone(),
            target_project_id: ctx.repository_id.to_string(),
            title: req.title.clone(),
            description: req.description.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, ctx.token)
            .json(&payload)
            .send()
            .await?;

        // 409 means an open merge request already exists for this pair
        if response.status() == StatusCode::CONFLICT {
            let body: CodeupErrorBody = response.json().await.unwrap_or_default();
            return Err(Error::Codeup(body.detail()));
        }

        let created: CreatedMergeRequest =
            Self::check_status(response).await?.json().await?;
        debug!(local_id = ?created.local_id, "created merge request");
        Ok(created)
    }

    async fn merge(
        &self,
        ctx: &RepoContext<'_>,
        merge_request_id: u64,
        opts: &MergeOptions,
    ) -> Result<serde_json::Value> {
        debug!(
            merge_request_id,
            merge_type = opts.merge_type,
            repo = ctx.repository_id,
            "merging"
        );
        let url = self.repo_url(ctx, &format!("/changeRequests/{merge_request_id}/merge"));

        let payload = MergePayload {
            merge_message: opts.merge_message.clone(),
            merge_type: opts.merge_type.clone(),
            remove_source_branch: opts.remove_source_branch,
        };

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, ctx.token)
            .json(&payload)
            .send()
            .await?;

        let result: serde_json::Value = Self::check_status(response).await?.json().await?;
        debug!(merge_request_id, "merge complete");
        Ok(result)
    }
}
