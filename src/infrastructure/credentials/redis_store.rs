//! Redis Credential Store
//!
//! All records of a session live in one hash, one field per key, so wiping a
//! session is a single `DEL`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::domain::{CredentialRecord, CredentialStore, StoreError};

/// Prefix for credential hashes (e.g. "auth:creds:default")
pub const CREDENTIALS_PREFIX: &str = "auth:creds:";

#[derive(Clone)]
pub struct RedisCredentialStore {
    redis: ConnectionManager,
    hash_key: String,
}

impl RedisCredentialStore {
    pub fn new(redis: ConnectionManager, session_id: &str) -> Self {
        Self {
            redis,
            hash_key: hash_key(session_id),
        }
    }
}

fn hash_key(session_id: &str) -> String {
    format!("{}{}", CREDENTIALS_PREFIX, session_id)
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn load(&self, key: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.hget(&self.hash_key, key).await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut conn = self.redis.clone();
        let fields: Vec<(String, String)> = conn.hgetall(&self.hash_key).await?;
        Ok(decode_fields(fields))
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;

        let mut conn = self.redis.clone();
        conn.hset::<_, _, _, ()>(&self.hash_key, &record.key, value)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.hdel::<_, _, ()>(&self.hash_key, key).await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(&self.hash_key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Records sorted by key. Fields that do not decode are skipped.
fn decode_fields(fields: Vec<(String, String)>) -> Vec<CredentialRecord> {
    let mut records: Vec<CredentialRecord> = fields
        .into_iter()
        .filter_map(|(field, json)| match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%field, error = %e, "Skipping unreadable credential field");
                None
            }
        })
        .collect();
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}
