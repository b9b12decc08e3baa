//! # WA Gateway
//!
//! Entry point: initializes logging, loads configuration, opens the
//! credential store and serves the REST API until a shutdown signal.

use anyhow::Result;
use tracing::info;

use wa_gateway::config::Settings;
use wa_gateway::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    wa_gateway::telemetry::init_tracing();

    info!("Starting WA Gateway...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        backend = ?settings.credentials.backend,
        base_path = %settings.http.base_path,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Server stopped");
    Ok(())
}
