//! Health Check API Tests

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{Script, TestApp};

#[tokio::test]
async fn test_health_check_reports_connection() {
    let app = TestApp::new(vec![Script::Open]);

    let response = app.server.get("/health").await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({ "status": "ok", "connected": false }));

    app.server.post("/connect").await.assert_status(StatusCode::OK);

    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["connected"], json!(true));
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new(vec![]);

    let response = app.server.get("/health/live").await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({ "status": "alive" }));
}

#[tokio::test]
async fn test_readiness_probe_checks_store() {
    let app = TestApp::new(vec![]);

    let response = app.server.get("/health/ready").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["checks"]["credential_store"]["backend"], json!("memory"));
    assert_eq!(body["checks"]["credential_store"]["status"], json!("healthy"));
    assert_eq!(body["checks"]["session"]["state"], json!("disconnected"));
    // Not paired yet, but still ready to serve the pairing flow
    assert_eq!(body["status"], json!("degraded"));
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_gateway_metrics() {
    let app = TestApp::new(vec![]);
    app.server.get("/status").await;

    let response = app.server.get("/metrics").await;
    response.assert_status(StatusCode::OK);
    let text = response.text();
    assert!(text.contains("wa_gateway_http_requests_total"));
    assert!(text.contains("wa_gateway_session_state"));
}
