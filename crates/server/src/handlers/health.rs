//! Liveness probe.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub instance: String,
    /// False when no token key is configured.
    pub paid_content: bool,
}

/// GET /healthz
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        instance: state.instance_name.to_string(),
        paid_content: state.player.accepts_paid(),
    })
}
