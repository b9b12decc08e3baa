//! Session API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wa_gateway::domain::CredentialStore;

use crate::common::{test_settings, Script, TestApp};

#[tokio::test]
async fn test_status_before_any_attempt() {
    let app = TestApp::new(vec![]);

    let response = app.server.get("/status").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["connected"], json!(false));
    assert_eq!(body["qrAvailable"], json!(false));
    assert_eq!(body["botNumber"], json!(null));
    assert_eq!(body["state"], json!("disconnected"));
    assert!(body["timestamp"].is_string());
    assert_eq!(app.connector.connects(), 0, "status must not connect");
}

#[tokio::test]
async fn test_connect_returns_pairing_code() {
    let app = TestApp::new(vec![Script::Pair]);

    let response = app.server.post("/connect").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["state"], json!("pairing-required"));
    assert_eq!(body["code"], json!("2@pairing-1"));
    assert_eq!(body["qr"], json!("data:image/png;base64,iVBORw0KGgo="));

    let status: Value = app.server.get("/status").await.json();
    assert_eq!(status["qrAvailable"], json!(true));
    assert_eq!(status["state"], json!("pairing-required"));

    // The credential update was written through
    assert!(app.store.load("creds").await.unwrap().is_some());
}

#[tokio::test]
async fn test_qr_connects_lazily() {
    let app = TestApp::new(vec![Script::Pair]);

    let response = app.server.get("/qr").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["code"], json!("2@pairing-1"));
    assert!(body["message"].is_string());
    assert_eq!(app.connector.connects(), 1);

    // A second request reuses the pending pairing
    let again: Value = app.server.get("/qr").await.json();
    assert_eq!(again["code"], json!("2@pairing-1"));
    assert_eq!(app.connector.connects(), 1);
}

#[tokio::test]
async fn test_connect_when_credentials_resume_session() {
    let app = TestApp::new(vec![Script::Open]);

    let body: Value = app.server.post("/connect").await.json();
    assert_eq!(body["state"], json!("connected"));
    assert_eq!(body["botNumber"], json!("6280000000001"));

    let status: Value = app.server.get("/status").await.json();
    assert_eq!(status["connected"], json!(true));
    assert_eq!(status["botNumber"], json!("6280000000001"));

    let qr: Value = app.server.get("/qr").await.json();
    assert_eq!(qr, json!({ "success": false, "message": "Already connected" }));
}

#[tokio::test]
async fn test_clear_auth_while_connected() {
    let app = TestApp::new(vec![Script::Open]);
    app.server.post("/connect").await.assert_status(StatusCode::OK);
    assert_eq!(app.store.len(), 1);

    let response = app.server.post("/clear-auth").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));

    assert!(app.store.is_empty());
    assert_eq!(
        app.connector
            .last_connection()
            .logouts
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    let status: Value = app.server.get("/status").await.json();
    assert_eq!(status["connected"], json!(false));
    assert_eq!(status["qrAvailable"], json!(false));
}

#[tokio::test]
async fn test_clear_auth_without_session() {
    let app = TestApp::new(vec![]);

    let response = app.server.post("/clear-auth").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(app.connector.connects(), 0);
}

#[tokio::test]
async fn test_dashboard_served_at_root() {
    let app = TestApp::new(vec![]);

    let response = app.server.get("/").await;
    response.assert_status(StatusCode::OK);
    let html = response.text();
    assert!(html.contains("<title>WA Gateway</title>"));
    assert!(html.contains(r#"const BASE = "";"#));
}

#[tokio::test]
async fn test_dashboard_can_be_disabled() {
    let mut settings = test_settings();
    settings.http.dashboard = false;
    let app = TestApp::with_settings(settings, vec![]);

    app.server.get("/").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_routes_mounted_under_base_path() {
    let mut settings = test_settings();
    settings.http.base_path = "/api/".into();
    let app = TestApp::with_settings(settings, vec![]);

    app.server.get("/api/status").await.assert_status(StatusCode::OK);
    app.server.get("/status").await.assert_status(StatusCode::NOT_FOUND);

    let html = app.server.get("/api").await.text();
    assert!(html.contains(r#"const BASE = "/api";"#));

    // Probes stay at the root
    app.server.get("/health").await.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_connect_times_out_without_pairing_or_open() {
    let mut settings = test_settings();
    settings.session.connect_timeout_secs = 1;
    let app = TestApp::with_settings(settings, vec![Script::Silent]);

    let response = app.server.post("/connect").await;
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);

    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("ConnectTimeout"));

    let status: Value = app.server.get("/status").await.json();
    assert_eq!(status["state"], json!("connecting"));
}
