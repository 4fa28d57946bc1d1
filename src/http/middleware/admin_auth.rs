use crate::http::error::err;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

pub const INTERNAL_API_KEY_HEADER: &str = "X-Internal-Api-Key";

/// Guards every host-facing and admin route; the host glue holds the shared key.
pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(INTERNAL_API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if expected.is_empty() || provided != expected {
        tracing::debug!("rejected {} {}: bad internal api key", request.method(), request.uri().path());
        return err(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing or invalid internal api key", None);
    }

    next.run(request).await
}
