//! Process configuration
//!
//! All knobs come from environment variables. Credentials are optional at
//! load time: the pipeline checks their presence per run and logs a
//! configuration failure instead of refusing to start.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default Codeup OpenAPI endpoint
pub const DEFAULT_API_BASE: &str = "https://openapi-rdc.aliyuncs.com";

/// Default HTTP bind address for the serve command
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8321";

/// Default seconds between scheduler due-task checks
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Credentials the pipeline needs before any remote call.
///
/// Both fields are `Option` so a missing value surfaces as a per-run
/// `failed` log rather than a process-level crash.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Access token (`CODEUP_TOKEN`)
    pub token: Option<String>,
    /// Organization id (`CODEUP_ORG_ID`)
    pub organization_id: Option<String>,
}

/// Feishu notification settings
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    /// Webhook URL; notifications are disabled when unset
    pub webhook_url: Option<String>,
    pub notify_on_success: bool,
    pub notify_on_failure: bool,
}

/// Full process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Codeup OpenAPI base URL (`CODEUP_API_BASE`, overridable for tests)
    pub api_base: String,
    /// Shared secret for the scheduler-check webhook (`WEBHOOK_SECRET`);
    /// when unset the webhook is open
    pub webhook_secret: Option<String>,
    pub notify: NotifyConfig,
    /// Directory holding the task/log state file (`AUTOMERGE_DATA_DIR`)
    pub data_dir: PathBuf,
    /// HTTP bind address for serve (`AUTOMERGE_BIND`)
    pub bind_addr: String,
    /// Seconds between scheduler checks (`AUTOMERGE_CHECK_INTERVAL_SECS`)
    pub check_interval: Duration,
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Self {
        let data_dir = env::var("AUTOMERGE_DATA_DIR").map_or_else(
            |_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("automerge-bot")
            },
            PathBuf::from,
        );

        let check_interval = env::var("AUTOMERGE_CHECK_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map_or(
                Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
                Duration::from_secs,
            );

        Self {
            credentials: Credentials {
                token: non_empty(env::var("CODEUP_TOKEN").ok()),
                organization_id: non_empty(env::var("CODEUP_ORG_ID").ok()),
            },
            api_base: env::var("CODEUP_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            webhook_secret: non_empty(env::var("WEBHOOK_SECRET").ok()),
            notify: NotifyConfig {
                webhook_url: non_empty(env::var("FEISHU_WEBHOOK_URL").ok()),
                notify_on_success: env_flag("FEISHU_NOTIFY_ON_SUCCESS", true),
                notify_on_failure: env_flag("FEISHU_NOTIFY_ON_FAILURE", true),
            },
            data_dir,
            bind_addr: env::var("AUTOMERGE_BIND")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            check_interval,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map_or(default, |v| !matches!(v.as_str(), "0" | "false" | "no"))
}
