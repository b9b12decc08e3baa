//! CORS Middleware Configuration
//!
//! Every route is a GET or a JSON POST, so only those methods and the
//! `Content-Type` header are allowed. An empty origin list allows any origin.

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsSettings;

const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

/// Create CORS layer from settings
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    match parse_origins(&settings.allowed_origins) {
        Some(origins) => layer.allow_origin(AllowOrigin::list(origins)),
        None => layer.allow_origin(Any),
    }
}

/// Valid origins, or `None` when none are configured. Unparseable entries are
/// skipped with a warning.
fn parse_origins(configured: &[String]) -> Option<Vec<HeaderValue>> {
    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    (!origins.is_empty()).then_some(origins)
}
