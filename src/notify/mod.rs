//! Outcome notifications
//!
//! The pipeline fires a notification on terminal outcomes. Delivery is
//! best-effort: a notifier failure never changes a run's recorded status.

use crate::error::{Error, Result};
use crate::types::RunStatus;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Outcome data handed to a notifier
#[derive(Debug, Clone)]
pub struct MergeNotification {
    pub task_name: String,
    pub status: RunStatus,
    pub message: String,
    pub merge_request_id: Option<u64>,
    pub merge_request_url: Option<String>,
    pub repository_name: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
}

/// Notification sink invoked by the pipeline on terminal outcomes
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &MergeNotification) -> Result<()>;
}

/// Feishu webhook notifier posting an interactive card
pub struct FeishuNotifier {
    client: Client,
    webhook_url: String,
    notify_on_success: bool,
    notify_on_failure: bool,
}

impl FeishuNotifier {
    /// Create a notifier posting to the given webhook URL
    pub fn new(
        webhook_url: String,
        notify_on_success: bool,
        notify_on_failure: bool,
    ) -> Result<Self> {
        url::Url::parse(&webhook_url)
            .map_err(|e| Error::Notify(format!("invalid webhook url: {e}")))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Notify(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            webhook_url,
            notify_on_success,
            notify_on_failure,
        })
    }

    fn card_payload(n: &MergeNotification) -> serde_json::Value {
        let (status_text, template) = match n.status {
            RunStatus::Success => ("成功✅", "green"),
            _ => ("失败❌", "red"),
        };

        let mut elements = vec![
            serde_json::json!({
                "tag": "div",
                "text": {
                    "content": format!(
                        "**合并仓库:** {}（任务名称：{}）",
                        n.repository_name.as_deref().unwrap_or("未知任务"),
                        n.task_name
                    ),
                    "tag": "lark_md"
                }
            }),
            serde_json::json!({
                "tag": "div",
                "text": {
                    "content": format!("**合并分支:** {} → {}", n.source_branch, n.target_branch),
                    "tag": "lark_md"
                }
            }),
            serde_json::json!({
                "tag": "div",
                "text": {
                    "content": format!("**合并信息:** {}", n.message),
                    "tag": "lark_md"
                }
            }),
        ];

        if let Some(url) = &n.merge_request_url {
            elements.push(serde_json::json!({
                "tag": "action",
                "actions": [{
                    "tag": "button",
                    "text": { "content": "查看合并请求", "tag": "plain_text" },
                    "url": url,
                    "type": "primary"
                }]
            }));
        }

        serde_json::json!({
            "msg_type": "interactive",
            "card": {
                "header": {
                    "title": { "content": format!("自动合并{status_text}"), "tag": "plain_text" },
                    "template": template
                },
                "elements": elements
            }
        })
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    async fn notify(&self, notification: &MergeNotification) -> Result<()> {
        let wanted = match notification.status {
            RunStatus::Success => self.notify_on_success,
            RunStatus::Failed => self.notify_on_failure,
            RunStatus::Info => false,
        };
        if !wanted {
            debug!(
                task = notification.task_name,
                status = %notification.status,
                "notification skipped by configuration"
            );
            return Ok(());
        }

        let payload = Self::card_payload(notification);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Notify(e.to_string()))?;

        debug!(task = notification.task_name, "notification sent");
        Ok(())
    }
}
