//! Shared fixtures for the integration test suite

#![allow(dead_code)]

pub mod mock_host;
pub mod mock_store;

pub use mock_host::MockMergeHost;
pub use mock_store::MockTaskStore;

use automerge_bot::config::Credentials;
use automerge_bot::types::Task;
use chrono::{Duration, Utc};

/// A task that is due now (next_run one minute in the past)
pub fn due_task(name: &str, source: &str, target: &str, interval_minutes: i64) -> Task {
    let now = Utc::now();
    Task {
        id: 0,
        name: name.to_string(),
        source_branch: source.to_string(),
        target_branch: target.to_string(),
        interval_minutes,
        enabled: true,
        repository_id: Some("1234".to_string()),
        repository_name: Some("demo-repo".to_string()),
        execute_user: None,
        last_run: None,
        next_run: Some(now - Duration::minutes(1)),
        created_at: now - Duration::hours(1),
        updated_at: now - Duration::hours(1),
    }
}

/// Credentials that satisfy the pipeline preconditions
pub fn credentials() -> Credentials {
    Credentials {
        token: Some("test-token-123456".to_string()),
        organization_id: Some("org-1".to_string()),
    }
}
