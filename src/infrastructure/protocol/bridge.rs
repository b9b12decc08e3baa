//! Gateway Bridge
//!
//! `ProtocolConnector` backed by an Evolution-API-compatible gateway. The
//! gateway runs the actual protocol client; this side creates or reattaches
//! the instance, then polls its connection state and turns what it sees into
//! `ProtocolEvent`s:
//!
//! ```text
//! connect() ── create / reattach ──> CredentialsUpdate, PairingCode
//!    │
//!    └─ poller ── "open" ──────────> Open
//!               ── not open yet ───> PairingCode (refreshed QR)
//!               ── "close" after open, or repeated failures ─> Closed(ConnectionLost)
//!               ── 404 ────────────> Closed(LoggedOut)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::api::{extract_pairing, GatewayApi, GatewayConfig, InstanceCredential};
use crate::config::ProtocolSettings;
use crate::domain::{
    CloseReason, CredentialRecord, ProtocolConnection, ProtocolConnector, ProtocolError,
    ProtocolEvent, ProtocolSession, USER_JID_SUFFIX,
};

/// Credential key holding the [`InstanceCredential`].
pub const INSTANCE_KEY: &str = "instance";

/// Polls between QR refreshes while waiting for the user to scan.
const QR_REFRESH_TICKS: u32 = 5;

/// Consecutive failed polls before the connection is declared lost.
const MAX_POLL_FAILURES: u32 = 5;

/// Connector for an Evolution-API-compatible gateway.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    api: GatewayApi,
}

impl BridgeConnector {
    pub fn new(settings: &ProtocolSettings) -> Result<Self, ProtocolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, GatewayConfig::from(settings)))
    }

    pub fn with_client(client: reqwest::Client, config: GatewayConfig) -> Self {
        Self {
            api: GatewayApi::new(client, config),
        }
    }

    /// The stored instance credential, if it belongs to the configured instance.
    fn stored_instance(&self, credentials: &[CredentialRecord]) -> Option<InstanceCredential> {
        let record = credentials.iter().find(|r| r.key == INSTANCE_KEY)?;
        match serde_json::from_value::<InstanceCredential>(record.value.clone()) {
            Ok(instance) if instance.instance_name == self.api.config().instance_name => Some(instance),
            Ok(instance) => {
                info!(
                    stored = %instance.instance_name,
                    configured = %self.api.config().instance_name,
                    "Stored instance credential is for another instance, ignoring"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Unreadable instance credential, ignoring");
                None
            }
        }
    }

    async fn create(&self, events: &mpsc::UnboundedSender<ProtocolEvent>) -> Result<Value, ProtocolError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let response = self.api.create_instance(&token).await?;

        let credential = InstanceCredential {
            instance_name: self.api.config().instance_name.clone(),
            token,
        };
        let value = serde_json::to_value(&credential)
            .map_err(|e| ProtocolError::InvalidResponse(e.to_string()))?;
        let _ = events.send(ProtocolEvent::CredentialsUpdate(vec![CredentialRecord::new(
            INSTANCE_KEY,
            value,
        )]));

        Ok(response)
    }
}

#[async_trait]
impl ProtocolConnector for BridgeConnector {
    #[instrument(skip_all, fields(instance = %self.api.config().instance_name))]
    async fn connect(&self, credentials: Vec<CredentialRecord>) -> Result<ProtocolSession, ProtocolError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let response = match self.stored_instance(&credentials) {
            Some(_) => match self.api.connect_instance().await {
                Ok(response) => {
                    info!("Reattached to existing gateway instance");
                    response
                }
                Err(ProtocolError::Rejected { status: 404, .. }) => {
                    info!("Stored instance no longer exists on the gateway, creating a new one");
                    self.create(&tx).await?
                }
                Err(e) => return Err(e),
            },
            None => self.create(&tx).await?,
        };

        let initial_code = extract_pairing(&response).map(|artifact| {
            let code = artifact.code.clone();
            let _ = tx.send(ProtocolEvent::PairingCode(artifact));
            code
        });

        let poller = tokio::spawn(poll_connection(self.api.clone(), tx, initial_code));

        Ok(ProtocolSession {
            connection: Arc::new(BridgeConnection {
                api: self.api.clone(),
                poller: Mutex::new(Some(poller)),
                closed: AtomicBool::new(false),
            }),
            events: rx,
        })
    }
}

/// Live handle on a gateway instance.
pub struct BridgeConnection {
    api: GatewayApi,
    poller: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl BridgeConnection {
    fn ensure_open(&self) -> Result<(), ProtocolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolConnection for BridgeConnection {
    async fn lookup_recipient(&self, jid: &str) -> Result<Option<String>, ProtocolError> {
        self.ensure_open()?;
        let number = jid.strip_suffix(USER_JID_SUFFIX).unwrap_or(jid);
        self.api.lookup_number(number).await
    }

    async fn send_text(&self, jid: &str, body: &str) -> Result<String, ProtocolError> {
        self.ensure_open()?;
        self.api.send_text(jid, body).await
    }

    async fn logout(&self) -> Result<(), ProtocolError> {
        self.api.logout().await?;
        self.close().await;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
        debug!("Gateway connection closed");
    }
}

impl Drop for BridgeConnection {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.abort();
        }
    }
}

/// Watch the instance until it closes or the receiver goes away.
async fn poll_connection(
    api: GatewayApi,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    mut last_code: Option<String>,
) {
    let mut interval = tokio::time::interval(api.config().poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    let mut opened = false;
    let mut failures = 0u32;
    let mut ticks_since_qr = 0u32;

    while !events.is_closed() {
        interval.tick().await;

        let state = match api.connection_state().await {
            Ok(state) => {
                failures = 0;
                state
            }
            Err(ProtocolError::Rejected { status: 404, .. }) => {
                info!("Gateway instance is gone, treating as logged out");
                let _ = events.send(ProtocolEvent::Closed(CloseReason::LoggedOut));
                return;
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "Connection state poll failed");
                if failures >= MAX_POLL_FAILURES {
                    let _ = events.send(ProtocolEvent::Closed(CloseReason::ConnectionLost));
                    return;
                }
                continue;
            }
        };

        match state.as_str() {
            "open" | "connected" if !opened => {
                opened = true;
                let identity = match api.fetch_identity().await {
                    Ok(identity) => identity,
                    Err(e) => {
                        warn!(error = %e, "Could not fetch account identity");
                        None
                    }
                };
                let _ = events.send(ProtocolEvent::Open(identity));
            }
            "open" | "connected" => {}
            "close" | "closed" if opened => {
                let _ = events.send(ProtocolEvent::Closed(CloseReason::ConnectionLost));
                return;
            }
            _ if !opened => {
                ticks_since_qr += 1;
                if ticks_since_qr < QR_REFRESH_TICKS {
                    continue;
                }
                ticks_since_qr = 0;
                match api.connect_instance().await {
                    Ok(response) => {
                        if let Some(artifact) = extract_pairing(&response) {
                            if last_code.as_deref() != Some(artifact.code.as_str()) {
                                last_code = Some(artifact.code.clone());
                                let _ = events.send(ProtocolEvent::PairingCode(artifact));
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "Refreshing pairing code failed"),
                }
            }
            other => debug!(state = other, "Gateway state unchanged"),
        }
    }
}
