//! Session Entity
//!
//! Observable state of the single messaging session owned by the gateway.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the session.
///
/// ```text
/// Disconnected -> Connecting -> PairingRequired -> Connecting -> Connected
///       ^______________________________________________________|  (close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    PairingRequired,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::PairingRequired => "pairing-required",
            ConnectionState::Connected => "connected",
        }
    }

    /// Numeric form used by the `session_state` gauge.
    pub fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::PairingRequired => 2,
            ConnectionState::Connected => 3,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The account the session is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Protocol address, e.g. `6281234567890@s.whatsapp.net`
    pub jid: String,
    /// Profile name if the network reported one
    pub name: Option<String>,
}

impl Identity {
    pub fn new(jid: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            name: None,
        }
    }

    /// The bare phone number part of the JID (device suffix stripped).
    pub fn phone_number(&self) -> &str {
        let user = self.jid.split('@').next().unwrap_or(&self.jid);
        user.split(':').next().unwrap_or(user)
    }
}

/// A one-time code presented to the user to link a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingArtifact {
    /// Raw pairing payload
    pub code: String,
    /// Rendered QR image as a data URL, when the protocol layer provides one
    pub image: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl PairingArtifact {
    pub fn new(code: impl Into<String>, image: Option<String>) -> Self {
        Self {
            code: code.into(),
            image,
            generated_at: Utc::now(),
        }
    }

    /// What a client should render: the image if present, otherwise the code.
    pub fn display_payload(&self) -> &str {
        self.image.as_deref().unwrap_or(&self.code)
    }
}

/// Point-in-time view of the session, safe to hand to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub identity: Option<Identity>,
    pub pairing: Option<PairingArtifact>,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn qr_available(&self) -> bool {
        self.pairing.is_some()
    }
}
