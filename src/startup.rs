//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;

use crate::application::services::{ConnectionManager, SessionPolicy};
use crate::config::Settings;
use crate::infrastructure::credentials;
use crate::infrastructure::protocol::BridgeConnector;
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{create_cors_layer, create_trace_layer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub settings: Arc<Settings>,
}

/// Router with the tracing and CORS layers applied.
pub fn build_router(state: AppState) -> Router {
    let cors = create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    manager: Arc<ConnectionManager>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let store = credentials::create_credential_store(&settings.credentials).await?;

        let connector = Arc::new(BridgeConnector::new(&settings.protocol)?);
        tracing::info!(
            gateway = %settings.protocol.base_url,
            instance = %settings.protocol.instance_name,
            "Protocol gateway configured"
        );

        let manager = ConnectionManager::new(
            connector,
            store,
            SessionPolicy::from(&settings.session),
        );

        let addr = settings.server_addr();
        let state = AppState {
            manager: manager.clone(),
            settings: Arc::new(settings),
        };
        let router = build_router(state);

        let listener = TcpListener::bind(addr.as_str()).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            manager,
        })
    }

    /// Serve until SIGINT/SIGTERM, then close the session.
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.manager.shutdown().await;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
