use crate::domain::rating::{CheckoutAnswer, CheckoutCheck};
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

/// Advisory check fired while the customer fills in the checkout form.
pub async fn preflight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(check): Json<CheckoutCheck>,
) -> impl IntoResponse {
    let check = with_client_ip(check, &headers);
    let decision = state.rating_gate.preflight(&check).await;
    (axum::http::StatusCode::OK, Json(CheckoutAnswer::from(&decision)))
}

/// Authoritative check the host runs right before creating the order.
pub async fn confirm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(check): Json<CheckoutCheck>,
) -> impl IntoResponse {
    let check = with_client_ip(check, &headers);
    let decision = state.rating_gate.confirm(&check).await;
    (axum::http::StatusCode::OK, Json(CheckoutAnswer::from(&decision)))
}

fn with_client_ip(mut check: CheckoutCheck, headers: &HeaderMap) -> CheckoutCheck {
    if check.ip_address.as_deref().map_or(true, |ip| ip.trim().is_empty()) {
        check.ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    check
}
