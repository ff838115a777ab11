//! Runtime settings endpoints.

use crate::auth::require_config_auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Current throttle settings.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ThrottleView {
    pub enabled: bool,
    pub scale: f64,
    pub bytes_per_sec: u64,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct ThrottleUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub scale: Option<f64>,
}

fn current(state: &AppState) -> ThrottleView {
    let settings = state.player.throttle_settings();
    ThrottleView {
        enabled: settings.enabled(),
        scale: settings.scale(),
        bytes_per_sec: settings.bytes_per_sec(),
    }
}

/// GET /config/throttle
pub async fn get_throttle(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ThrottleView>> {
    require_config_auth(&headers, &state.config.server)?;
    Ok(Json(current(&state)))
}

/// POST /config/throttle
///
/// Streams already running keep the settings they started with.
pub async fn update_throttle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<ThrottleUpdate>,
) -> ApiResult<Json<ThrottleView>> {
    require_config_auth(&headers, &state.config.server)?;

    let settings = state.player.throttle_settings();
    if let Some(scale) = update.scale {
        settings.set_scale(scale).map_err(ApiError::BadRequest)?;
    }
    if let Some(enabled) = update.enabled {
        settings.set_enabled(enabled);
    }

    let view = current(&state);
    tracing::info!(enabled = view.enabled, scale = view.scale, "throttle settings updated");
    Ok(Json(view))
}
