//! Protocol Client Contract
//!
//! The messaging wire protocol, handshake and credential encoding are owned by
//! an external client. The gateway only sees it through these two traits:
//!
//! - [`ProtocolConnector`] opens a connection from stored credentials and hands
//!   back the connection together with its event stream.
//! - [`ProtocolConnection`] is the live handle used to look up recipients,
//!   send text and log out.
//!
//! Connectors must not reconnect on their own. A lost connection is reported
//! once as [`ProtocolEvent::Closed`] and the session manager decides what
//! happens next.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::entities::{CredentialRecord, Identity, PairingArtifact};

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The account unlinked this device; stored credentials are useless now.
    LoggedOut,
    /// Network drop, gateway restart, stream error.
    ConnectionLost,
    /// The pairing code expired without being scanned.
    PairingExpired,
    Other(String),
}

impl CloseReason {
    pub fn is_logged_out(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::LoggedOut => f.write_str("logged out"),
            CloseReason::ConnectionLost => f.write_str("connection lost"),
            CloseReason::PairingExpired => f.write_str("pairing expired"),
            CloseReason::Other(reason) => f.write_str(reason),
        }
    }
}

/// Signals emitted by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// A (new) pairing code must be shown to the user.
    PairingCode(PairingArtifact),
    /// The connection is open and authenticated. The identity is `None` when
    /// the network did not report which account is logged in.
    Open(Option<Identity>),
    /// Authentication material changed and must be persisted.
    CredentialsUpdate(Vec<CredentialRecord>),
    /// The connection is gone. No further events follow.
    Closed(CloseReason),
}

/// Protocol-layer failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("Gateway request failed: {0}")]
    Transport(String),

    #[error("Gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("Connection is closed")]
    Closed,
}

/// A freshly opened connection and the events it will emit.
pub struct ProtocolSession {
    pub connection: Arc<dyn ProtocolConnection>,
    pub events: mpsc::UnboundedReceiver<ProtocolEvent>,
}

impl fmt::Debug for ProtocolSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolSession").finish_non_exhaustive()
    }
}

/// Opens connections to the messaging network.
#[async_trait]
pub trait ProtocolConnector: Send + Sync {
    /// Start a connection using whatever credentials are stored.
    ///
    /// Returning `Ok` does not mean the connection is open: the outcome
    /// arrives as a `PairingCode`, `Open` or `Closed` event.
    async fn connect(&self, credentials: Vec<CredentialRecord>) -> Result<ProtocolSession, ProtocolError>;
}

/// A live connection handle.
#[async_trait]
pub trait ProtocolConnection: Send + Sync {
    /// Resolve a bare JID to the registered address, or `None` if the number
    /// is not on the network.
    async fn lookup_recipient(&self, jid: &str) -> Result<Option<String>, ProtocolError>;

    /// Send a text message and return the network's message id.
    async fn send_text(&self, jid: &str, body: &str) -> Result<String, ProtocolError>;

    /// Unlink this device from the account.
    async fn logout(&self) -> Result<(), ProtocolError>;

    /// Drop the connection without unlinking. Idempotent.
    async fn close(&self);
}
