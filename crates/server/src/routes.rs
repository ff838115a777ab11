//! Route configuration.

use crate::auth::trace_middleware;
use crate::handlers;
use crate::metrics::{metrics_handler, register_metrics};
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // `get` also answers HEAD; handlers skip the body for it
    let stream_routes = Router::new()
        .route(
            "/content/claims/{claim_name}/{claim_id}/{filename}",
            get(handlers::get_claim_content),
        )
        .route(
            "/api/v3/streams/free/{claim_name}/{claim_id}",
            get(handlers::get_free_stream),
        )
        .route(
            "/api/v3/streams/paid/{claim_name}/{claim_id}/{token}",
            get(handlers::get_paid_stream),
        );

    let control_routes = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route(
            "/config/throttle",
            get(handlers::get_throttle).post(handlers::update_throttle),
        );

    let mut router = Router::new().merge(stream_routes).merge(control_routes);

    // When enabled, /metrics should only be reachable by the scrapers.
    if state.config.server.metrics_enabled {
        register_metrics();
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
