//! In-Memory Credential Store
//!
//! Records live only as long as the process. Suitable for throwaway
//! deployments where every restart pairs again, and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{CredentialRecord, CredentialStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn load_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.write().remove(key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.records.write().clear();
        Ok(())
    }
}
