//! PostgreSQL Credential Store
//!
//! Each record is a JSONB row in `auth_credentials`, keyed by
//! `(session_id, key)` so several gateways can share one database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{CredentialRecord, CredentialStore, StoreError};

/// Database row representation matching the auth_credentials table schema.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    key: String,
    value: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_record(self) -> CredentialRecord {
        CredentialRecord {
            key: self.key,
            value: self.value,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL credential store implementation.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    session_id: String,
}

impl PgCredentialStore {
    /// Create a new PgCredentialStore with the given connection pool.
    pub fn new(pool: PgPool, session_id: impl Into<String>) -> Self {
        Self {
            pool,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self, key: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT key, value, updated_at
            FROM auth_credentials
            WHERE session_id = $1 AND key = $2
            "#,
        )
        .bind(&self.session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record()))
    }

    async fn load_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT key, value, updated_at
            FROM auth_credentials
            WHERE session_id = $1
            ORDER BY key
            "#,
        )
        .bind(&self.session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_record()).collect())
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_credentials (session_id, key, value, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&self.session_id)
        .bind(&record.key)
        .bind(&record.value)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_credentials WHERE session_id = $1 AND key = $2")
            .bind(&self.session_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM auth_credentials WHERE session_id = $1")
            .bind(&self.session_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(rows = result.rows_affected(), "Credential rows deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
