//! Probe endpoints
//!
//! `/health` mirrors the session's connected flag, `/health/live` only proves the
//! process answers, and `/health/ready` pings the credential store.
//!
//! An unpaired or disconnected session does not make the gateway unready:
//! pairing happens through the API itself.

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::domain::{ConnectionState, CredentialStore, SessionStatus};
use crate::startup::AppState;

/// Store pings slower than this report as degraded.
const SLOW_STORE: Duration = Duration::from_millis(100);

static STARTED: Lazy<(Instant, DateTime<Utc>)> = Lazy::new(|| (Instant::now(), Utc::now()));

/// Pin the uptime origin to process start rather than the first probe.
pub fn init_server_start() {
    Lazy::force(&STARTED);
}

/// Ordered so the overall verdict is the worst component verdict.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Verdict {
    fn status_code(self) -> StatusCode {
        match self {
            Verdict::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::OK,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Heartbeat {
    pub status: &'static str,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub status: Verdict,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: Checks,
}

#[derive(Debug, Serialize)]
pub struct Checks {
    pub credential_store: StoreCheck,
    pub session: SessionCheck,
}

#[derive(Debug, Serialize)]
pub struct StoreCheck {
    pub status: Verdict,
    pub backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionCheck {
    pub status: Verdict,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
}

impl From<&SessionStatus> for SessionCheck {
    fn from(status: &SessionStatus) -> Self {
        Self {
            status: if status.is_connected() {
                Verdict::Healthy
            } else {
                Verdict::Degraded
            },
            state: status.state,
            reconnect_attempts: status.reconnect_attempts,
        }
    }
}

impl Checks {
    fn verdict(&self) -> Verdict {
        self.credential_store.status.max(self.session.status)
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Heartbeat> {
    Json(Heartbeat {
        status: "ok",
        connected: state.manager.status().is_connected(),
    })
}

pub async fn liveness() -> Json<Liveness> {
    Json(Liveness { status: "alive" })
}

/// 503 only when the credential store cannot be reached.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let checks = Checks {
        credential_store: ping_store(state.manager.store().as_ref()).await,
        session: SessionCheck::from(&state.manager.status()),
    };
    let verdict = checks.verdict();

    let (started, started_at) = &*STARTED;
    let report = ReadinessReport {
        status: verdict,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: started.elapsed().as_secs(),
        started_at: started_at.to_rfc3339(),
        checks,
    };

    (verdict.status_code(), Json(report))
}

async fn ping_store(store: &dyn CredentialStore) -> StoreCheck {
    let start = Instant::now();
    let outcome = store.ping().await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(()) => StoreCheck {
            status: if elapsed < SLOW_STORE {
                Verdict::Healthy
            } else {
                Verdict::Degraded
            },
            backend: store.backend(),
            latency_ms: Some(elapsed.as_millis() as u64),
            error: None,
        },
        Err(e) => StoreCheck {
            status: Verdict::Unhealthy,
            backend: store.backend(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}
