//! Message API Tests

use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{Script, TestApp};

#[tokio::test]
async fn test_send_while_disconnected_is_unavailable() {
    let app = TestApp::new(vec![]);

    let response = app
        .server
        .post("/send-message")
        .json(&json!({ "phone": "081234567890", "message": "hi" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("NotConnected"));
    assert_eq!(app.connector.connects(), 0, "send must not connect");
}

#[tokio::test]
async fn test_send_after_connect() {
    let app = TestApp::new(vec![Script::Open]);
    app.server.post("/connect").await.assert_status(StatusCode::OK);

    let response = app
        .server
        .post("/send-message")
        .json(&json!({ "phone": "0812-3456-7890", "message": "Your order has shipped" }))
        .await;

    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({
        "success": true,
        "to": "6281234567890",
        "messageId": "3EB00001"
    }));

    let sent = app.connector.last_connection().sent.lock().clone();
    assert_eq!(
        sent,
        vec![(
            "6281234567890@s.whatsapp.net".to_string(),
            "Your order has shipped".to_string()
        )]
    );
}

#[tokio::test]
async fn test_send_to_unregistered_number() {
    let app = TestApp::new(vec![Script::Open]);
    app.server.post("/connect").await.assert_status(StatusCode::OK);

    let response = app
        .server
        .post("/send-message")
        .json(&json!({ "phone": "6289999999999", "message": "hi" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], json!("RecipientNotFound"));
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let app = TestApp::new(vec![]);

    for payload in [
        json!({ "message": "hi" }),
        json!({ "phone": "081234567890" }),
        json!({ "phone": "", "message": "hi" }),
        json!({ "phone": "081234567890", "message": "" }),
    ] {
        let response = app.server.post("/send-message").json(&payload).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], json!("ValidationError"), "payload {payload}");
    }
}

#[tokio::test]
async fn test_phone_without_digits_is_rejected() {
    let app = TestApp::new(vec![]);

    let response = app
        .server
        .post("/send-message")
        .json(&json!({ "phone": "not a number", "message": "hi" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = TestApp::new(vec![]);

    let response = app
        .server
        .post("/send-message")
        .bytes(Bytes::from_static(b"{\"phone\": "))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], json!("ValidationError"));
}
