use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

pub fn err(status: StatusCode, code: &str, message: &str, details: Option<serde_json::Value>) -> Response {
    (
        status,
        Json(ErrorEnvelope {
            error: ErrorPayload {
                code: code.to_string(),
                message: message.to_string(),
                details,
            },
        }),
    )
        .into_response()
}

pub fn internal(e: anyhow::Error) -> Response {
    tracing::error!("request failed: {:#}", e);
    err(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal error", None)
}
