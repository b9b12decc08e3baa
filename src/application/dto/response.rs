//! Response DTOs
//!
//! Data structures for API response bodies. Field names are camelCase on the
//! wire.

use serde::Serialize;

use crate::application::services::ConnectOutcome;
use crate::domain::{ConnectionState, PairingArtifact, SessionStatus};

/// `GET /status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    pub qr_available: bool,
    pub bot_number: Option<String>,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub timestamp: String,
}

impl From<SessionStatus> for StatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            connected: status.is_connected(),
            qr_available: status.qr_available(),
            bot_number: status
                .identity
                .as_ref()
                .map(|identity| identity.phone_number().to_string()),
            state: status.state,
            reconnect_attempts: status.reconnect_attempts,
            last_error: status.last_error,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// `GET /qr`
#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl QrResponse {
    pub fn pairing(artifact: PairingArtifact) -> Self {
        Self {
            success: true,
            qr: Some(artifact.display_payload().to_string()),
            code: Some(artifact.code),
            message: "Scan the QR code with WhatsApp (Linked devices)".into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            qr: None,
            code: None,
            message: message.into(),
        }
    }
}

/// `POST /connect`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub success: bool,
    pub state: ConnectionState,
    pub bot_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<ConnectOutcome> for ConnectResponse {
    fn from(outcome: ConnectOutcome) -> Self {
        match outcome {
            ConnectOutcome::Connected { identity } => Self {
                success: true,
                state: ConnectionState::Connected,
                bot_number: identity.map(|identity| identity.phone_number().to_string()),
                qr: None,
                code: None,
            },
            ConnectOutcome::PairingRequired(artifact) => Self {
                success: true,
                state: ConnectionState::PairingRequired,
                bot_number: None,
                qr: Some(artifact.display_payload().to_string()),
                code: Some(artifact.code),
            },
        }
    }
}

/// `POST /send-message`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub to: String,
    pub message_id: String,
}

/// `POST /clear-auth`
#[derive(Debug, Serialize)]
pub struct ClearAuthResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;
    use chrono::Utc;
    use serde_json::json;

    fn status(state: ConnectionState) -> SessionStatus {
        SessionStatus {
            state,
            identity: None,
            pairing: None,
            reconnect_attempts: 0,
            last_error: None,
            last_activity: Utc::now(),
        }
    }

    #[test]
    fn test_status_before_connect_has_null_bot_number() {
        let value = serde_json::to_value(StatusResponse::from(status(ConnectionState::Disconnected)))
            .unwrap();
        assert_eq!(value["connected"], json!(false));
        assert_eq!(value["qrAvailable"], json!(false));
        assert_eq!(value["botNumber"], json!(null));
        assert_eq!(value["state"], json!("disconnected"));
        assert!(value.get("lastError").is_none());
    }

    #[test]
    fn test_status_reports_bot_number() {
        let mut connected = status(ConnectionState::Connected);
        connected.identity = Some(Identity::new("6281234567890:3@s.whatsapp.net"));
        let value = serde_json::to_value(StatusResponse::from(connected)).unwrap();
        assert_eq!(value["connected"], json!(true));
        assert_eq!(value["botNumber"], json!("6281234567890"));
    }

    #[test]
    fn test_connect_response_for_pairing() {
        let artifact = PairingArtifact::new("2@abc", None);
        let value =
            serde_json::to_value(ConnectResponse::from(ConnectOutcome::PairingRequired(artifact)))
                .unwrap();
        assert_eq!(value["state"], json!("pairing-required"));
        assert_eq!(value["qr"], json!("2@abc"));
        assert_eq!(value["code"], json!("2@abc"));
    }
}
