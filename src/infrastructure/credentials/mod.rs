//! Credential Store Module
//!
//! Backends for the `CredentialStore` contract:
//!
//! ```text
//! +---------------------------+
//! |    ConnectionManager      |
//! +---------------------------+
//!              |
//!              v
//! +---------------------------+
//! |  CredentialStore (trait)  |  <-- Abstract interface
//! +---------------------------+
//!    |        |       |      |
//!    v        v       v      v
//! Memory    File  Postgres  Redis
//! ```
//!
//! The backend is picked once at startup from `credentials.backend`.

mod file_store;
mod memory_store;
mod pg_store;
mod redis_store;

use std::sync::Arc;

use tracing::info;

pub use file_store::FileCredentialStore;
pub use memory_store::MemoryCredentialStore;
pub use pg_store::PgCredentialStore;
pub use redis_store::{RedisCredentialStore, CREDENTIALS_PREFIX};

use crate::config::{CredentialBackend, CredentialSettings};
use crate::domain::CredentialStore;
use crate::infrastructure::{cache, database};

/// Errors raised while opening a credential backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreSetupError {
    #[error("{0} backend selected but no connection URL configured")]
    MissingUrl(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store error: {0}")]
    Store(#[from] crate::domain::StoreError),
}

/// Open the configured credential backend.
pub async fn create_credential_store(
    settings: &CredentialSettings,
) -> Result<Arc<dyn CredentialStore>, StoreSetupError> {
    let store: Arc<dyn CredentialStore> = match settings.backend {
        CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        CredentialBackend::File => {
            let directory = settings.directory.join(&settings.session_id);
            Arc::new(FileCredentialStore::open(directory).await?)
        }
        CredentialBackend::Postgres => {
            let url = settings
                .database_url
                .as_deref()
                .ok_or(StoreSetupError::MissingUrl("postgres"))?;
            let pool = database::create_pool(url, settings.max_connections).await?;
            database::run_migrations(&pool).await?;
            Arc::new(PgCredentialStore::new(pool, settings.session_id.clone()))
        }
        CredentialBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .ok_or(StoreSetupError::MissingUrl("redis"))?;
            let conn = cache::create_redis_client(url).await?;
            Arc::new(RedisCredentialStore::new(conn, &settings.session_id))
        }
    };

    info!(
        backend = store.backend(),
        session_id = %settings.session_id,
        "Credential store ready"
    );
    Ok(store)
}
