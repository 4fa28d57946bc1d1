use crate::domain::block_event::{BlockEvent, BlockStats};
use crate::domain::upload::QueueStats;
use crate::http::error::{err, internal};
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECENT_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub blocks: BlockStats,
    pub queue: QueueStats,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DiagnosticsQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecentBlocksResponse {
    pub events: Vec<BlockEvent>,
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let blocks = match state.block_log.stats_all().await {
        Ok(b) => b,
        Err(e) => return internal(e),
    };
    match state.upload_queue.stats().await {
        Ok(queue) => (axum::http::StatusCode::OK, Json(StatsResponse { blocks, queue })).into_response(),
        Err(e) => internal(e),
    }
}

pub async fn recent_blocks(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT).max(1);
    match state.block_log.recent(limit).await {
        Ok(events) => (axum::http::StatusCode::OK, Json(RecentBlocksResponse { events })).into_response(),
        Err(e) => internal(e),
    }
}

pub async fn drain_queue(State(state): State<AppState>) -> impl IntoResponse {
    match state.upload_queue.drain(state.drain_batch_limit).await {
        Ok(report) => (axum::http::StatusCode::OK, Json(report)).into_response(),
        Err(e) => internal(e),
    }
}

pub async fn sweep_queue(State(state): State<AppState>) -> impl IntoResponse {
    let queue_removed = match state.upload_queue.sweep().await {
        Ok(n) => n,
        Err(e) => return internal(e),
    };
    match state.block_log.sweep().await {
        Ok(events_removed) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "queue_removed": queue_removed,
                "events_removed": events_removed
            })),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

pub async fn requeue_failed(State(state): State<AppState>) -> impl IntoResponse {
    match state.upload_queue.requeue_failed().await {
        Ok(requeued) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({ "requeued": requeued })),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

pub async fn rating_diagnostics(
    State(state): State<AppState>,
    Query(query): Query<DiagnosticsQuery>,
) -> impl IntoResponse {
    let Some(email) = query.email.filter(|e| !e.trim().is_empty()) else {
        return err(
            axum::http::StatusCode::BAD_REQUEST,
            "EMAIL_REQUIRED",
            "email query parameter is required",
            None,
        );
    };
    match state.rating_gate.diagnose(&email).await {
        Ok(diagnosis) => (axum::http::StatusCode::OK, Json(diagnosis)).into_response(),
        Err(e) => internal(e),
    }
}
