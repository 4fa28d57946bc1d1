use crate::http::handlers::{admin, checkout, ops, orders, settings};
use crate::http::middleware::admin_auth::require_internal_api_key;
use crate::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState, internal_api_key: String) -> Router {
    let guarded = Router::new()
        .route("/checkout/preflight", post(checkout::preflight))
        .route("/checkout/confirm", post(checkout::confirm))
        .route("/hooks/order-status", post(orders::status_changed))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/blocks/recent", get(admin::recent_blocks))
        .route("/admin/diagnostics/rating", get(admin::rating_diagnostics))
        .route("/admin/queue/drain", post(admin::drain_queue))
        .route("/admin/queue/sweep", post(admin::sweep_queue))
        .route("/admin/queue/requeue-failed", post(admin::requeue_failed))
        .route(
            "/admin/settings",
            get(settings::get_settings).put(settings::put_settings),
        )
        .layer(from_fn_with_state(internal_api_key, require_internal_api_key));

    Router::new()
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
