//! File Credential Store
//!
//! One JSON file per record under a directory. Point the directory at a temp
//! location for ephemeral deployments, or at a persistent volume to survive
//! restarts.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::domain::{CredentialRecord, CredentialStore, StoreError};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    directory: PathBuf,
}

impl FileCredentialStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", file_name_for(key), EXTENSION))
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Keys may contain path separators and colons; neither is safe in a file name.
fn file_name_for(key: &str) -> String {
    key.replace('/', "__").replace(':', "-")
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn load(&self, key: &str) -> Result<Option<CredentialRecord>, StoreError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records = Vec::new();
        for path in self.json_files().await? {
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<CredentialRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable credential file"),
            }
        }
        Ok(records)
    }

    #[instrument(skip(self, record), fields(key = %record.key))]
    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.key);
        let tmp = path.with_extension("tmp");
        let bytes = serde_json::to_vec(record)?;

        // Write-then-rename so a crash never leaves a truncated record behind
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        debug!("Credential record written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        for path in self.json_files().await? {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        fs::metadata(&self.directory).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_file_name_sanitized() {
        assert_eq!(file_name_for("pre-key/1:2"), "pre-key__1-2");
    }

    #[tokio::test]
    async fn test_roundtrip_and_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path()).await.unwrap();

        let record = CredentialRecord::new("session:abc", json!({"token": "t-1"}));
        store.save(&record).await.unwrap();
        store
            .save(&CredentialRecord::new("creds", json!({"me": "62812"})))
            .await
            .unwrap();

        assert_eq!(store.load("session:abc").await.unwrap(), Some(record));
        assert_eq!(store.load_all().await.unwrap().len(), 2);

        store.delete_all().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.load("creds").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_leaves_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("README.txt"), "keep me").unwrap();
        store.save(&CredentialRecord::new("creds", json!(1))).await.unwrap();

        store.delete_all().await.unwrap();

        assert!(dir.path().join("README.txt").exists());
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("auth").join("default");
        let store = FileCredentialStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        store.ping().await.unwrap();
    }
}
