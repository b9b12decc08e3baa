//! Credential Entity
//!
//! Durable authentication material that lets a session resume without
//! re-pairing, and the store contract every backend implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One keyed piece of authentication state.
///
/// The value is opaque to the gateway; it is whatever the protocol layer
/// handed over in a credential update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }
}

/// Credential persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage contract for credential records.
///
/// Writes go straight to the backing store; implementations must not batch or
/// cache, since a lost update forces the user to pair again.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Load one record.
    async fn load(&self, key: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Load every record of this session.
    async fn load_all(&self) -> Result<Vec<CredentialRecord>, StoreError>;

    /// Insert or replace a record.
    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError>;

    /// Delete one record. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete every record of this session.
    async fn delete_all(&self) -> Result<(), StoreError>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
