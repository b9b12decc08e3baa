//! Route Configuration
//!
//! Session routes are mounted under `http.base_path`; health and metrics
//! always sit at the root so probes do not depend on the prefix.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::track_metrics;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let base = state.settings.http.normalized_base_path().to_owned();
    let dashboard = state.settings.http.dashboard;

    let mut router = Router::new()
        .route(&path(&base, "/status"), get(handlers::session::get_status))
        .route(&path(&base, "/qr"), get(handlers::session::get_qr))
        .route(&path(&base, "/connect"), post(handlers::session::connect))
        .route(&path(&base, "/send-message"), post(handlers::message::send_message))
        .route(&path(&base, "/clear-auth"), post(handlers::session::clear_auth));

    if dashboard {
        router = router.route(&path(&base, "/"), get(handlers::dashboard::index));
        if !base.is_empty() {
            router = router.route(&base, get(handlers::dashboard::index));
        }
    }

    router
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

fn path(base: &str, route: &str) -> String {
    format!("{base}{route}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_joins_base() {
        assert_eq!(path("", "/status"), "/status");
        assert_eq!(path("/api", "/status"), "/api/status");
        assert_eq!(path("/api", "/"), "/api/");
    }
}
