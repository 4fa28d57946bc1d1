use crate::domain::settings::CodGuardSettings;
use crate::http::error::{err, internal};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    match state.settings_repo.load().await {
        Ok(settings) => (StatusCode::OK, Json(settings.masked())).into_response(),
        Err(e) => internal(e),
    }
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(incoming): Json<CodGuardSettings>,
) -> impl IntoResponse {
    let stored = match state.settings_repo.load().await {
        Ok(s) => s,
        Err(e) => return internal(e),
    };
    let settings = incoming.keep_masked_secrets(&stored);

    if let Err(errors) = settings.validate() {
        return err(
            StatusCode::BAD_REQUEST,
            "INVALID_SETTINGS",
            "settings failed validation",
            serde_json::to_value(errors).ok(),
        );
    }

    if let Err(e) = state.settings_repo.save(&settings).await {
        return internal(e);
    }
    state.settings_cache.invalidate().await;
    tracing::info!(
        "settings updated: shop {}, enabled {}, tolerance {}%",
        settings.shop_id,
        settings.enabled,
        settings.rating_tolerance
    );

    (StatusCode::OK, Json(settings.masked())).into_response()
}
