//! HTTP surface for the scheduler
//!
//! Thin handlers over the core: trigger one task, read logs, and the
//! webhook/cron entry point for an immediate due-task check.

use crate::scheduler::Scheduler;
use crate::types::ExecutionType;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    /// Shared secret for the scheduler-check webhook; open when unset
    pub webhook_secret: Option<String>,
}

/// Build the router for the scheduler surface
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tasks/{id}/execute", post(execute_task_endpoint))
        .route("/logs", get(logs_endpoint))
        .route("/scheduler/check", post(check_endpoint))
        .route("/scheduler/status", get(status_endpoint))
        .with_state(state)
}

async fn execute_task_endpoint(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let task = match state.scheduler.store().task(id).await {
        Ok(task) => task,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "message": "服务器内部错误",
                    "error": e.to_string()
                })),
            );
        }
    };

    let Some(task) = task else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "success": false, "message": "任务不存在" })),
        );
    };

    if !task.enabled {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "success": false, "message": "任务已禁用" })),
        );
    }

    let result = state
        .scheduler
        .execute_task(&task, ExecutionType::Manual)
        .await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "自动合并执行完成",
            "data": result
        })),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogsQuery {
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    page_size: Option<usize>,
}

async fn logs_endpoint(
    Query(query): Query<LogsQuery>,
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(100);

    match state.scheduler.store().logs_page(page, page_size).await {
        Ok(logs) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "data": logs.entries,
                "total": logs.total,
                "page": logs.page,
                "pageSize": logs.page_size
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "success": false,
                "message": "服务器内部错误",
                "error": e.to_string()
            })),
        ),
    }
}

#[derive(Deserialize, Default)]
struct CheckPayload {
    #[serde(default)]
    secret: Option<String>,
}

async fn check_endpoint(
    State(state): State<AppState>,
    Query(query): Query<CheckPayload>,
    payload: Result<Json<CheckPayload>, JsonRejection>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Some(expected) = &state.webhook_secret {
        // The secret may arrive in the JSON body or the query string
        let supplied = payload
            .ok()
            .and_then(|Json(p)| p.secret)
            .or(query.secret);
        if supplied.as_deref() != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "success": false, "message": "无效的webhook密钥" })),
            );
        }
    }

    info!("webhook triggered task check");
    let outcomes = state.scheduler.check_and_execute_tasks().await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "任务检查完成",
            "data": outcomes,
            "timestamp": Utc::now()
        })),
    )
}

async fn status_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": state.scheduler.status()
    }))
}
