//! Session Handlers
//!
//! Status, pairing, connect and credential reset.

use axum::{extract::State, Json};
use tracing::info;

use crate::application::dto::{ClearAuthResponse, ConnectResponse, QrResponse, StatusResponse};
use crate::application::services::ConnectOutcome;
use crate::shared::error::AppError;
use crate::startup::AppState;

const ALREADY_CONNECTED: &str = "Already connected";

/// Current session state. Never connects.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.manager.status().into())
}

/// Current pairing code, connecting first if needed.
pub async fn get_qr(State(state): State<AppState>) -> Result<Json<QrResponse>, AppError> {
    if state.manager.status().is_connected() {
        return Ok(Json(QrResponse::unavailable(ALREADY_CONNECTED)));
    }

    match state.manager.ensure_connected().await? {
        ConnectOutcome::PairingRequired(artifact) => Ok(Json(QrResponse::pairing(artifact))),
        ConnectOutcome::Connected { .. } => Ok(Json(QrResponse::unavailable(ALREADY_CONNECTED))),
    }
}

pub async fn connect(State(state): State<AppState>) -> Result<Json<ConnectResponse>, AppError> {
    let outcome = state.manager.ensure_connected().await?;
    Ok(Json(outcome.into()))
}

/// Log out and delete all stored credentials.
pub async fn clear_auth(State(state): State<AppState>) -> Result<Json<ClearAuthResponse>, AppError> {
    state.manager.clear().await?;
    info!("Authentication cleared via API");

    Ok(Json(ClearAuthResponse {
        success: true,
        message: "Authentication cleared. Request a new QR code to pair again.".into(),
    }))
}
