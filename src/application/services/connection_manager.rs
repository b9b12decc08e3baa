//! Connection Manager
//!
//! Owns the one protocol session of the process: connecting, pairing,
//! persisting credential updates, reconnecting after unexpected closes and
//! tearing down on clear, idle or shutdown.
//!
//! ```text
//!                 +-------------------+
//!   HTTP  ------> | ConnectionManager | <---- pump task (events of the current generation)
//!                 +-------------------+
//!                   |      |       ^
//!        connect    |      | save  | reconnect requests
//!                   v      v       |
//!           ProtocolConnector  CredentialStore   supervisor task
//! ```
//!
//! Every connection attempt gets a new generation number. Events and reconnect
//! requests carry the generation they belong to and are dropped once a newer
//! attempt (or a clear, idle teardown or shutdown) has taken over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SessionSettings;
use crate::domain::{
    CloseReason, ConnectionState, CredentialStore, Identity, PairingArtifact, PhoneNumber,
    ProtocolConnection, ProtocolConnector, ProtocolError, ProtocolEvent, SessionStatus, StoreError,
};
use crate::infrastructure::metrics;

/// Connection manager errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Timed out waiting for a pairing code or an open connection")]
    ConnectTimeout,

    #[error("No open session")]
    NotConnected,

    #[error("Recipient {0} is not registered")]
    RecipientNotFound(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Connection closed: {0}")]
    Closed(CloseReason),

    #[error("Gateway is shutting down")]
    ShuttingDown,
}

/// Result of [`ConnectionManager::ensure_connected`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    Connected { identity: Option<Identity> },
    PairingRequired(PairingArtifact),
}

/// Timing and retry knobs, resolved from [`SessionSettings`].
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub idle_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
}

impl SessionPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): base doubled per
    /// attempt, capped at the max delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }
}

impl From<&SessionSettings> for SessionPolicy {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            reconnect_base_delay: Duration::from_millis(settings.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(settings.reconnect_max_delay_ms),
            idle_timeout: settings.idle_timeout(),
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

/// What to do after an unexpected close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32 },
    /// Attempts used up: wipe credentials and try once from scratch.
    WipeAndRestart,
    GiveUp,
}

/// Counts automatic reconnects between successful opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryCounter {
    attempts: u32,
    max_attempts: u32,
    exhausted: bool,
}

impl RetryCounter {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            exhausted: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
    }

    pub fn next(&mut self) -> RetryDecision {
        if self.exhausted {
            RetryDecision::GiveUp
        } else if self.attempts < self.max_attempts {
            self.attempts += 1;
            RetryDecision::Retry {
                attempt: self.attempts,
            }
        } else {
            self.exhausted = true;
            RetryDecision::WipeAndRestart
        }
    }
}

/// Latest milestone of a connection attempt, published on the watch channel.
#[derive(Debug, Clone, PartialEq)]
enum Signal {
    Pending,
    Pairing(PairingArtifact),
    Open(Option<Identity>),
    Closed(CloseReason),
    /// Torn down by clear, idle timeout or shutdown.
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
struct Progress {
    generation: u64,
    signal: Signal,
}

#[derive(Debug, Clone, Copy)]
struct ReconnectRequest {
    generation: u64,
    attempt: u32,
    fresh: bool,
}

/// The session handle and everything `status()` reports.
struct SessionState {
    generation: u64,
    state: ConnectionState,
    connection: Option<Arc<dyn ProtocolConnection>>,
    identity: Option<Identity>,
    pairing: Option<PairingArtifact>,
    retry: RetryCounter,
    last_error: Option<String>,
    last_activity: DateTime<Utc>,
    last_touch: Instant,
}

impl SessionState {
    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        metrics::set_session_state(state.as_gauge());
    }

    /// Drop back to Disconnected, handing out the connection for closing.
    fn teardown(&mut self) -> Option<Arc<dyn ProtocolConnection>> {
        self.set_state(ConnectionState::Disconnected);
        self.identity = None;
        self.pairing = None;
        self.connection.take()
    }
}

/// The single session of the gateway.
pub struct ConnectionManager {
    connector: Arc<dyn ProtocolConnector>,
    store: Arc<dyn CredentialStore>,
    policy: SessionPolicy,
    session: RwLock<SessionState>,
    /// Serializes connect, reconnect, clear and idle teardown.
    connect_lock: tokio::sync::Mutex<()>,
    /// Held by a logout close from teardown until its wipe is done. Connects
    /// read credentials under it, so they never see logged-out records.
    wipe_lock: tokio::sync::Mutex<()>,
    progress: watch::Sender<Progress>,
    reconnects: mpsc::UnboundedSender<ReconnectRequest>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl ConnectionManager {
    /// Create the manager and start its reconnect supervisor (and idle
    /// watcher, if an idle timeout is set). Must be called inside a runtime.
    pub fn new(
        connector: Arc<dyn ProtocolConnector>,
        store: Arc<dyn CredentialStore>,
        policy: SessionPolicy,
    ) -> Arc<Self> {
        let (reconnects, reconnect_rx) = mpsc::unbounded_channel();
        let (progress, _) = watch::channel(Progress {
            generation: 0,
            signal: Signal::Reset,
        });

        let manager = Arc::new(Self {
            connector,
            store,
            session: RwLock::new(SessionState {
                generation: 0,
                state: ConnectionState::Disconnected,
                connection: None,
                identity: None,
                pairing: None,
                retry: RetryCounter::new(policy.max_reconnect_attempts),
                last_error: None,
                last_activity: Utc::now(),
                last_touch: Instant::now(),
            }),
            policy,
            connect_lock: tokio::sync::Mutex::new(()),
            wipe_lock: tokio::sync::Mutex::new(()),
            progress,
            reconnects,
            tasks: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
        });
        metrics::set_session_state(ConnectionState::Disconnected.as_gauge());

        let mut tasks = vec![tokio::spawn(supervise_reconnects(
            Arc::downgrade(&manager),
            reconnect_rx,
        ))];
        if let Some(idle) = manager.policy.idle_timeout {
            tasks.push(tokio::spawn(watch_idle(Arc::downgrade(&manager), idle)));
        }
        *manager.tasks.lock() = tasks;

        manager
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Record activity for the idle watcher.
    pub fn touch(&self) {
        let mut session = self.session.write();
        session.last_activity = Utc::now();
        session.last_touch = Instant::now();
    }

    /// Snapshot of the session. Never blocks on I/O.
    pub fn status(&self) -> SessionStatus {
        let session = self.session.read();
        SessionStatus {
            state: session.state,
            identity: session.identity.clone(),
            pairing: session.pairing.clone(),
            reconnect_attempts: session.retry.attempts(),
            last_error: session.last_error.clone(),
            last_activity: session.last_activity,
        }
    }

    pub fn pairing_artifact(&self) -> Option<PairingArtifact> {
        self.touch();
        self.session.read().pairing.clone()
    }

    /// Return the open connection or the pending pairing code, starting a
    /// connection first if there is none.
    #[instrument(skip(self))]
    pub async fn ensure_connected(self: &Arc<Self>) -> Result<ConnectOutcome, ConnectionError> {
        self.touch();
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(ConnectionError::ShuttingDown);
        }

        let _guard = self.connect_lock.lock().await;
        let mut progress = self.progress.subscribe();

        let pending = {
            let mut session = self.session.write();
            match session.state {
                ConnectionState::Connected => {
                    return Ok(ConnectOutcome::Connected {
                        identity: session.identity.clone(),
                    });
                }
                ConnectionState::PairingRequired => match session.pairing.clone() {
                    Some(artifact) => return Ok(ConnectOutcome::PairingRequired(artifact)),
                    None => Some(session.generation),
                },
                ConnectionState::Connecting => Some(session.generation),
                ConnectionState::Disconnected => {
                    // An explicit request re-arms automatic reconnects.
                    session.retry.reset();
                    None
                }
            }
        };

        let generation = match pending {
            Some(generation) => {
                debug!(generation, "Joining connection attempt in progress");
                generation
            }
            None => self.start_connection().await?,
        };

        let waited = tokio::time::timeout(
            self.policy.connect_timeout,
            progress.wait_for(|p| p.generation != generation || p.signal != Signal::Pending),
        )
        .await;

        let signal = match waited {
            Ok(Ok(progress)) if progress.generation == generation => progress.signal.clone(),
            Ok(_) => return Err(ConnectionError::ShuttingDown),
            Err(_) => {
                warn!(generation, timeout = ?self.policy.connect_timeout, "Connect timed out");
                return Err(ConnectionError::ConnectTimeout);
            }
        };

        match signal {
            Signal::Pairing(artifact) => Ok(ConnectOutcome::PairingRequired(artifact)),
            Signal::Open(identity) => Ok(ConnectOutcome::Connected { identity }),
            Signal::Closed(reason) => Err(ConnectionError::Closed(reason)),
            Signal::Reset | Signal::Pending => Err(ConnectionError::ShuttingDown),
        }
    }

    /// Send a text message over the open session and return its message id.
    ///
    /// Never connects: without an open session this fails with
    /// `NotConnected` before any protocol call.
    #[instrument(skip(self, destination, body), fields(to = %destination))]
    pub async fn send_text(
        &self,
        destination: &PhoneNumber,
        body: &str,
    ) -> Result<String, ConnectionError> {
        self.touch();
        let result = self.deliver(destination, body).await;
        let label = match &result {
            Ok(_) => "sent",
            Err(ConnectionError::NotConnected) => "not_connected",
            Err(ConnectionError::RecipientNotFound(_)) => "not_found",
            Err(_) => "failed",
        };
        metrics::record_message(label);
        result
    }

    async fn deliver(&self, destination: &PhoneNumber, body: &str) -> Result<String, ConnectionError> {
        let connection = {
            let session = self.session.read();
            if !session.state.is_connected() {
                return Err(ConnectionError::NotConnected);
            }
            session.connection.clone()
        }
        .ok_or(ConnectionError::NotConnected)?;

        let jid = connection
            .lookup_recipient(&destination.to_jid())
            .await?
            .ok_or_else(|| ConnectionError::RecipientNotFound(destination.to_string()))?;

        let message_id = connection.send_text(&jid, body).await?;
        info!(to = %jid, message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    /// Log out, drop the connection and delete every credential record.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), ConnectionError> {
        self.touch();
        let _guard = self.connect_lock.lock().await;

        let (generation, connection) = {
            let mut session = self.session.write();
            session.generation += 1;
            session.retry.reset();
            session.last_error = None;
            (session.generation, session.teardown())
        };
        self.publish(generation, Signal::Reset);

        if let Some(connection) = connection {
            match tokio::time::timeout(self.policy.shutdown_timeout, connection.logout()).await {
                Ok(Ok(())) => debug!("Logged out"),
                Ok(Err(e)) => warn!(error = %e, "Logout failed, closing anyway"),
                Err(_) => warn!("Logout timed out, closing anyway"),
            }
            connection.close().await;
        }

        self.store.delete_all().await?;
        metrics::record_credential_wipe("cleared");
        info!(generation, "Session cleared");
        Ok(())
    }

    /// Close the session at process exit. Credentials are kept.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let (generation, connection) = {
            let mut session = self.session.write();
            session.generation += 1;
            (session.generation, session.teardown())
        };
        self.publish(generation, Signal::Reset);

        if let Some(connection) = connection {
            if tokio::time::timeout(self.policy.shutdown_timeout, connection.close())
                .await
                .is_err()
            {
                warn!("Connection did not close within the shutdown timeout");
            }
        }
        info!("Connection manager stopped");
    }

    /// Start a new connection generation. Caller holds `connect_lock`.
    async fn start_connection(self: &Arc<Self>) -> Result<u64, ConnectionError> {
        let credentials = {
            let _wiped = self.wipe_lock.lock().await;
            self.store.load_all().await?
        };

        let generation = {
            let mut session = self.session.write();
            session.generation += 1;
            session.identity = None;
            session.pairing = None;
            session.connection = None;
            session.set_state(ConnectionState::Connecting);
            session.generation
        };
        self.publish(generation, Signal::Pending);
        info!(generation, records = credentials.len(), "Connecting");

        let protocol_session = match self.connector.connect(credentials).await {
            Ok(protocol_session) => protocol_session,
            Err(e) => {
                let mut session = self.session.write();
                if session.generation == generation {
                    session.set_state(ConnectionState::Disconnected);
                    session.last_error = Some(e.to_string());
                }
                error!(generation, error = %e, "Connect failed");
                return Err(e.into());
            }
        };

        let stale = {
            let mut session = self.session.write();
            if session.generation == generation {
                session.connection = Some(protocol_session.connection.clone());
                false
            } else {
                true
            }
        };
        if stale {
            protocol_session.connection.close().await;
            return Err(ConnectionError::ShuttingDown);
        }

        tokio::spawn(pump_events(
            Arc::downgrade(self),
            generation,
            protocol_session.events,
        ));
        Ok(generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session.read().generation == generation
    }

    fn publish(&self, generation: u64, signal: Signal) {
        self.progress.send_replace(Progress { generation, signal });
    }

    /// Apply one event. Returns `false` once the connection is finished.
    async fn handle_event(&self, generation: u64, event: ProtocolEvent) -> bool {
        match event {
            ProtocolEvent::PairingCode(artifact) => {
                {
                    let mut session = self.session.write();
                    if session.generation != generation {
                        return false;
                    }
                    session.set_state(ConnectionState::PairingRequired);
                    session.pairing = Some(artifact.clone());
                }
                info!(generation, "Pairing code received");
                self.publish(generation, Signal::Pairing(artifact));
                true
            }
            ProtocolEvent::Open(identity) => {
                {
                    let mut session = self.session.write();
                    if session.generation != generation {
                        return false;
                    }
                    session.set_state(ConnectionState::Connected);
                    session.pairing = None;
                    session.identity = identity.clone();
                    session.retry.reset();
                    session.last_error = None;
                }
                info!(
                    generation,
                    account = identity.as_ref().map(|i| i.phone_number()).unwrap_or("unknown"),
                    "Connection open"
                );
                self.publish(generation, Signal::Open(identity));
                true
            }
            ProtocolEvent::CredentialsUpdate(records) => {
                if !self.is_current(generation) {
                    return false;
                }
                for record in &records {
                    if let Err(e) = self.store.save(record).await {
                        error!(key = %record.key, error = %e, "Failed to persist credential update");
                        self.session.write().last_error = Some(e.to_string());
                    }
                }
                debug!(generation, count = records.len(), "Credentials persisted");
                true
            }
            ProtocolEvent::Closed(reason) => {
                self.handle_close(generation, reason).await;
                false
            }
        }
    }

    async fn handle_close(&self, generation: u64, reason: CloseReason) {
        // Taken before the session reads as Disconnected and kept until the
        // close is published.
        let _wiping = if reason.is_logged_out() {
            Some(self.wipe_lock.lock().await)
        } else {
            None
        };

        let (connection, decision) = {
            let mut session = self.session.write();
            if session.generation != generation {
                debug!(generation, %reason, "Ignoring close of a stale connection");
                return;
            }
            let connection = session.teardown();
            session.last_error = Some(reason.to_string());
            let decision = if reason.is_logged_out() {
                session.retry.reset();
                None
            } else {
                Some(session.retry.next())
            };
            (connection, decision)
        };
        if let Some(connection) = connection {
            connection.close().await;
        }

        match decision {
            None => {
                warn!(generation, "Logged out by the account, wiping credentials");
                self.wipe("logged_out").await;
            }
            Some(decision) => {
                warn!(generation, %reason, "Connection closed");
                self.schedule(generation, decision);
            }
        }
        self.publish(generation, Signal::Closed(reason));
    }

    fn schedule(&self, generation: u64, decision: RetryDecision) {
        let request = match decision {
            RetryDecision::Retry { attempt } => ReconnectRequest {
                generation,
                attempt,
                fresh: false,
            },
            RetryDecision::WipeAndRestart => {
                warn!(
                    max_attempts = self.policy.max_reconnect_attempts,
                    "Reconnect attempts exhausted, restarting from a clean session"
                );
                ReconnectRequest {
                    generation,
                    attempt: 0,
                    fresh: true,
                }
            }
            RetryDecision::GiveUp => {
                error!("Fresh session failed as well, automatic reconnection stopped");
                self.session.write().last_error =
                    Some("automatic reconnection stopped".to_string());
                return;
            }
        };
        if self.reconnects.send(request).is_err() {
            warn!("Reconnect supervisor is gone");
        }
    }

    async fn wipe(&self, cause: &'static str) {
        match self.store.delete_all().await {
            Ok(()) => {
                metrics::record_credential_wipe(cause);
                info!(cause, "Credentials wiped");
            }
            Err(e) => {
                error!(cause, error = %e, "Failed to wipe credentials");
                self.session.write().last_error = Some(e.to_string());
            }
        }
    }

    async fn reconnect(self: &Arc<Self>, request: ReconnectRequest) {
        let delay = if request.fresh {
            self.policy.reconnect_base_delay
        } else {
            self.policy.backoff(request.attempt)
        };
        debug!(?request, ?delay, "Reconnect scheduled");
        tokio::time::sleep(delay).await;

        let _guard = self.connect_lock.lock().await;
        {
            let session = self.session.read();
            if session.generation != request.generation
                || session.state != ConnectionState::Disconnected
                || self.shutting_down.load(Ordering::Acquire)
            {
                debug!(?request, "Dropping stale reconnect");
                return;
            }
        }

        metrics::record_reconnect_attempt();
        if request.fresh {
            self.wipe("retries_exhausted").await;
        }
        info!(attempt = request.attempt, fresh = request.fresh, "Reconnecting");

        if let Err(e) = self.start_connection().await {
            warn!(error = %e, "Reconnect attempt failed");
            let (generation, decision) = {
                let mut session = self.session.write();
                session.last_error = Some(e.to_string());
                (session.generation, session.retry.next())
            };
            self.schedule(generation, decision);
        }
    }

    async fn teardown_if_idle(&self, idle: Duration) {
        let _guard = self.connect_lock.lock().await;
        let (generation, connection) = {
            let mut session = self.session.write();
            if session.state == ConnectionState::Disconnected || session.last_touch.elapsed() < idle {
                return;
            }
            session.generation += 1;
            (session.generation, session.teardown())
        };
        self.publish(generation, Signal::Reset);

        if let Some(connection) = connection {
            connection.close().await;
        }
        info!(idle = ?idle, "Session idle, connection closed");
    }
}

/// Forward events of one connection until it closes.
async fn pump_events(
    manager: Weak<ConnectionManager>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ProtocolEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(manager) = manager.upgrade() else {
            return;
        };
        if !manager.handle_event(generation, event).await {
            return;
        }
    }

    // Event stream ended without a close event
    if let Some(manager) = manager.upgrade() {
        manager
            .handle_close(generation, CloseReason::ConnectionLost)
            .await;
    }
}

async fn supervise_reconnects(
    manager: Weak<ConnectionManager>,
    mut requests: mpsc::UnboundedReceiver<ReconnectRequest>,
) {
    while let Some(request) = requests.recv().await {
        let Some(manager) = manager.upgrade() else {
            return;
        };
        manager.reconnect(request).await;
    }
}

async fn watch_idle(manager: Weak<ConnectionManager>, idle: Duration) {
    let period = (idle / 4).max(Duration::from_millis(10));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let Some(manager) = manager.upgrade() else {
            return;
        };
        let expired = {
            let session = manager.session.read();
            session.state != ConnectionState::Disconnected && session.last_touch.elapsed() >= idle
        };
        if expired {
            manager.teardown_if_idle(idle).await;
        }
    }
}
