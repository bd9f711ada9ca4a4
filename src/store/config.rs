//! Sync configuration persistence.
//!
//! The configuration boundary holds three things the engine reads at the
//! start of every run: the sync date window, the user's IANA timezone, and
//! the checkpoint metadata written after successful fetches. The file
//! implementation keeps them together in one JSON document under the data
//! directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{StoreError, SyncConfig, SyncMetadata};

/// Configuration store boundary consumed by the sync engine.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn sync_config(&self) -> Result<Option<SyncConfig>, StoreError>;
    async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError>;
    async fn sync_metadata(&self) -> Result<Option<SyncMetadata>, StoreError>;
    async fn set_sync_metadata(&self, metadata: &SyncMetadata) -> Result<(), StoreError>;
    /// IANA timezone name; defaults to UTC when the user never picked one.
    async fn timezone(&self) -> Result<String, StoreError>;
    async fn set_timezone(&self, timezone: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    sync_config: Option<SyncConfig>,
    #[serde(default)]
    sync_metadata: Option<SyncMetadata>,
    #[serde(default)]
    timezone: Option<String>,
}

/// JSON-on-disk implementation of [`ConfigStore`].
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    /// Create a store persisting to `sync_config.json` under the data
    /// directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("sync_config.json"),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<ConfigDocument, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigDocument::default()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save(&self, document: &ConfigDocument) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(document)?;
        let temp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!("Saved sync configuration to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn sync_config(&self) -> Result<Option<SyncConfig>, StoreError> {
        Ok(self.load().await?.sync_config)
    }

    async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        document.sync_config = Some(*config);
        self.save(&document).await
    }

    async fn sync_metadata(&self) -> Result<Option<SyncMetadata>, StoreError> {
        Ok(self.load().await?.sync_metadata)
    }

    async fn set_sync_metadata(&self, metadata: &SyncMetadata) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        document.sync_metadata = Some(metadata.clone());
        self.save(&document).await
    }

    async fn timezone(&self) -> Result<String, StoreError> {
        Ok(self
            .load()
            .await?
            .timezone
            .unwrap_or_else(|| "UTC".to_string()))
    }

    async fn set_timezone(&self, timezone: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        document.timezone = Some(timezone.to_string());
        self.save(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_config_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());

        assert!(store.sync_config().await.unwrap().is_none());
        assert_eq!(store.timezone().await.unwrap(), "UTC");

        let config = SyncConfig {
            start_date: "2024-01-01".parse().unwrap(),
            end_date: "2024-01-07".parse().unwrap(),
        };
        store.set_sync_config(&config).await.unwrap();
        store.set_timezone("Europe/Berlin").await.unwrap();

        let metadata = SyncMetadata {
            last_sync: Some(chrono::Utc::now()),
            delta_token: Some("opaque123".into()),
            last_modified_seen: None,
        };
        store.set_sync_metadata(&metadata).await.unwrap();

        // Separate fields survive each other's writes.
        let reopened = FileConfigStore::new(dir.path());
        assert_eq!(reopened.sync_config().await.unwrap(), Some(config));
        assert_eq!(reopened.timezone().await.unwrap(), "Europe/Berlin");
        assert_eq!(
            reopened.sync_metadata().await.unwrap().unwrap().delta_token,
            Some("opaque123".into())
        );
    }
}
