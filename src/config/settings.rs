//! Application settings and configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// HTTP façade layout (base path, dashboard, number normalization)
    pub http: HttpSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Connection lifecycle tuning
    pub session: SessionSettings,

    /// Protocol gateway the session is opened against
    pub protocol: ProtocolSettings,

    /// Credential persistence backend
    pub credentials: CredentialSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// HTTP route layout.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// Prefix for the session routes, e.g. "/api". Empty mounts them at the root.
    pub base_path: String,

    /// Serve the HTML status page at the base path
    pub dashboard: bool,

    /// Country calling code used when normalizing destination numbers
    pub default_country_code: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (empty allows any origin)
    pub allowed_origins: Vec<String>,
}

/// Connection lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// How long a caller waits for a pairing code or an open connection
    pub connect_timeout_secs: u64,

    /// Reconnect attempts after an unexpected close before credentials are wiped
    pub max_reconnect_attempts: u32,

    /// First reconnect delay; doubles on every attempt
    pub reconnect_base_delay_ms: u64,

    /// Upper bound for the reconnect delay
    pub reconnect_max_delay_ms: u64,

    /// Tear the session down after this much inactivity (0 disables)
    pub idle_timeout_secs: u64,

    /// Bound on the graceful close performed at process exit
    pub shutdown_timeout_secs: u64,
}

/// Protocol gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolSettings {
    /// Gateway base URL (e.g. "http://127.0.0.1:8085")
    pub base_url: String,

    /// API key sent in the `apikey` header
    pub api_key: String,

    /// Instance the session is bound to
    pub instance_name: String,

    /// Connection-state polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Where credential records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    Memory,
    File,
    Postgres,
    Redis,
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSettings {
    /// Selected backend
    pub backend: CredentialBackend,

    /// Namespace for records, so several gateways can share one database
    pub session_id: String,

    /// Directory for the file backend
    pub directory: PathBuf,

    /// PostgreSQL connection URL (postgres backend)
    pub database_url: Option<String>,

    /// Maximum number of pooled connections (postgres backend)
    pub max_connections: u32,

    /// Redis connection URL (redis backend)
    pub redis_url: Option<String>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed, or if
    /// the selected credential backend is missing its connection URL.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("http.base_path", "")?
            .set_default("http.dashboard", true)?
            .set_default("http.default_country_code", "62")?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("session.connect_timeout_secs", 30)?
            .set_default("session.max_reconnect_attempts", 5)?
            .set_default("session.reconnect_base_delay_ms", 1000)?
            .set_default("session.reconnect_max_delay_ms", 30000)?
            .set_default("session.idle_timeout_secs", 0)?
            .set_default("session.shutdown_timeout_secs", 5)?
            .set_default("protocol.base_url", "http://127.0.0.1:8085")?
            .set_default("protocol.api_key", "")?
            .set_default("protocol.instance_name", "wa-gateway")?
            .set_default("protocol.poll_interval_ms", 3000)?
            .set_default("protocol.request_timeout_secs", 15)?
            .set_default("credentials.backend", "file")?
            .set_default("credentials.session_id", "default")?
            .set_default("credentials.directory", "auth_info")?
            .set_default("credentials.max_connections", 5)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SESSION__IDLE_TIMEOUT_SECS=300 -> session.idle_timeout_secs = 300
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("credentials.database_url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("credentials.redis_url", std::env::var("REDIS_URL").ok())?
            .set_override_option("protocol.base_url", std::env::var("GATEWAY_URL").ok())?
            .set_override_option("protocol.api_key", std::env::var("GATEWAY_API_KEY").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate().map(|()| settings))
    }

    /// Check cross-field requirements that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.credentials.backend {
            CredentialBackend::Postgres if self.credentials.database_url.is_none() => {
                return Err(ConfigError::Message(
                    "credentials.database_url (or DATABASE_URL) is required for the postgres backend".into(),
                ));
            }
            CredentialBackend::Redis if self.credentials.redis_url.is_none() => {
                return Err(ConfigError::Message(
                    "credentials.redis_url (or REDIS_URL) is required for the redis backend".into(),
                ));
            }
            _ => {}
        }

        if self.session.max_reconnect_attempts == 0 {
            return Err(ConfigError::Message(
                "session.max_reconnect_attempts must be at least 1".into(),
            ));
        }

        if !self.http.base_path.is_empty() && !self.http.base_path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "http.base_path must start with '/', got {:?}",
                self.http.base_path
            )));
        }

        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl HttpSettings {
    /// Base path without a trailing slash.
    pub fn normalized_base_path(&self) -> &str {
        self.base_path.trim_end_matches('/')
    }
}

impl SessionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `None` when the idle teardown is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30000,
            idle_timeout_secs: 0,
            shutdown_timeout_secs: 5,
        }
    }
}
