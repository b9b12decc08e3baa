//! Application Error Types
//!
//! Centralized error handling with Axum integration. Every failure reaches the
//! caller as `{"success": false, "error": <kind>, "message": <text>}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::services::ConnectionError;
use crate::domain::{PhoneNumberError, ProtocolError, StoreError};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Timed out waiting for a pairing code or an open connection")]
    ConnectTimeout,

    #[error("No open session")]
    NotConnected,

    #[error("Recipient {0} is not registered")]
    RecipientNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, sent as the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ConnectTimeout => "ConnectTimeout",
            AppError::NotConnected => "NotConnected",
            AppError::RecipientNotFound(_) => "RecipientNotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::Store(_) => "StoreError",
            AppError::Protocol(_) => "ProtocolError",
            AppError::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConnectTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RecipientNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Protocol(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Store(e) => {
                tracing::error!(error = %e, "Credential store error");
                "Credential store unavailable".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Protocol(msg) => {
                tracing::warn!("Protocol error: {}", msg);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::ConnectTimeout => AppError::ConnectTimeout,
            ConnectionError::NotConnected => AppError::NotConnected,
            ConnectionError::RecipientNotFound(jid) => AppError::RecipientNotFound(jid),
            ConnectionError::Store(e) => AppError::Store(e),
            ConnectionError::Protocol(e) => AppError::Protocol(e.to_string()),
            ConnectionError::Closed(reason) => {
                AppError::Protocol(format!("connection closed: {reason}"))
            }
            ConnectionError::ShuttingDown => AppError::Internal("gateway is shutting down".into()),
        }
    }
}

impl From<ProtocolError> for AppError {
    fn from(err: ProtocolError) -> Self {
        AppError::Protocol(err.to_string())
    }
}

impl From<PhoneNumberError> for AppError {
    fn from(err: PhoneNumberError) -> Self {
        AppError::Validation(format!("phone: {err}"))
    }
}
