use crate::http::error::internal;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OrderStatusChange {
    pub order_id: i64,
    pub order_status_id: i64,
}

/// Host notification that an order moved to a new status.
pub async fn status_changed(
    State(state): State<AppState>,
    Json(change): Json<OrderStatusChange>,
) -> impl IntoResponse {
    match state
        .upload_queue
        .enqueue(change.order_id, change.order_status_id)
        .await
    {
        Ok(outcome) => (
            axum::http::StatusCode::ACCEPTED,
            Json(serde_json::json!({ "result": outcome })),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}
