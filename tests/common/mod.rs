//! Common Test Utilities
//!
//! A `TestServer` over the real router, backed by an in-memory credential
//! store and a scripted protocol connector.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

use wa_gateway::application::services::{ConnectionManager, SessionPolicy};
use wa_gateway::config::{
    CorsSettings, CredentialBackend, CredentialSettings, HttpSettings, ProtocolSettings,
    ServerSettings, SessionSettings, Settings,
};
use wa_gateway::domain::{
    CredentialRecord, Identity, PairingArtifact, ProtocolConnection, ProtocolConnector,
    ProtocolError, ProtocolEvent, ProtocolSession,
};
use wa_gateway::infrastructure::credentials::MemoryCredentialStore;
use wa_gateway::startup::{build_router, AppState};

pub const BOT_JID: &str = "6280000000001@s.whatsapp.net";

/// What the next connect does.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Persist a credential and present a pairing code
    Pair,
    /// Persist a credential and open immediately
    Open,
    /// Persist a credential and then say nothing
    Silent,
}

/// Records outbound messages; numbers starting with 62812 are registered.
#[derive(Default)]
pub struct ScriptedConnection {
    pub sent: Mutex<Vec<(String, String)>>,
    pub logouts: AtomicUsize,
}

#[async_trait]
impl ProtocolConnection for ScriptedConnection {
    async fn lookup_recipient(&self, jid: &str) -> Result<Option<String>, ProtocolError> {
        Ok(jid.starts_with("62812").then(|| jid.to_string()))
    }

    async fn send_text(&self, jid: &str, body: &str) -> Result<String, ProtocolError> {
        let mut sent = self.sent.lock();
        sent.push((jid.to_string(), body.to_string()));
        Ok(format!("3EB0{:04}", sent.len()))
    }

    async fn logout(&self) -> Result<(), ProtocolError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {}
}

pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
    last: Mutex<Option<(Arc<ScriptedConnection>, mpsc::UnboundedSender<ProtocolEvent>)>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_connection(&self) -> Arc<ScriptedConnection> {
        self.last
            .lock()
            .as_ref()
            .map(|(connection, _)| connection.clone())
            .expect("no connection was opened")
    }

    /// Push an event into the most recent connection.
    pub fn emit(&self, event: ProtocolEvent) {
        if let Some((_, tx)) = self.last.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl ProtocolConnector for ScriptedConnector {
    async fn connect(&self, _credentials: Vec<CredentialRecord>) -> Result<ProtocolSession, ProtocolError> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Pair);

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ProtocolEvent::CredentialsUpdate(vec![CredentialRecord::new(
            "creds",
            json!({ "attempt": n }),
        )]));
        let _ = match script {
            Script::Pair => tx.send(ProtocolEvent::PairingCode(PairingArtifact::new(
                format!("2@pairing-{n}"),
                Some("data:image/png;base64,iVBORw0KGgo=".into()),
            ))),
            Script::Open => tx.send(ProtocolEvent::Open(Some(Identity::new(BOT_JID)))),
            Script::Silent => Ok(()),
        };

        let connection = Arc::new(ScriptedConnection::default());
        *self.last.lock() = Some((connection.clone(), tx));
        Ok(ProtocolSession {
            connection,
            events: rx,
        })
    }
}

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        http: HttpSettings {
            base_path: String::new(),
            dashboard: true,
            default_country_code: "62".into(),
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        session: SessionSettings {
            connect_timeout_secs: 5,
            ..SessionSettings::default()
        },
        protocol: ProtocolSettings {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "test".into(),
            instance_name: "test".into(),
            poll_interval_ms: 1000,
            request_timeout_secs: 1,
        },
        credentials: CredentialSettings {
            backend: CredentialBackend::Memory,
            session_id: "test".into(),
            directory: PathBuf::from("auth_info"),
            database_url: None,
            max_connections: 1,
            redis_url: None,
        },
        environment: "test".into(),
    }
}

/// Test application wired like production, minus the network.
pub struct TestApp {
    pub server: TestServer,
    pub manager: Arc<ConnectionManager>,
    pub connector: Arc<ScriptedConnector>,
    pub store: Arc<MemoryCredentialStore>,
}

impl TestApp {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self::with_settings(test_settings(), scripts)
    }

    pub fn with_settings(settings: Settings, scripts: Vec<Script>) -> Self {
        let connector = ScriptedConnector::new(scripts);
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = ConnectionManager::new(
            connector.clone(),
            store.clone(),
            SessionPolicy::from(&settings.session),
        );

        let router = build_router(AppState {
            manager: manager.clone(),
            settings: Arc::new(settings),
        });
        let server = TestServer::new(router).expect("failed to start test server");

        Self {
            server,
            manager,
            connector,
            store,
        }
    }
}
