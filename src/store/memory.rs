//! In-memory store implementations.
//!
//! Back the engine's unit tests and ephemeral runs where nothing should
//! touch disk. Counts and semantics are shared with the file store through
//! [`apply_drafts`](super::apply_drafts).

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::config::ConfigStore;
use super::types::{
    EventDraft, LocalEvent, StoreError, SyncConfig, SyncMetadata, UpsertStats,
};
use super::{EventStore, apply_drafts};

/// Ephemeral implementation of [`EventStore`].
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<LocalEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(&self) -> Result<Vec<LocalEvent>, StoreError> {
        Ok(self.events.lock().unwrap().clone())
    }

    async fn create(&self, mut event: LocalEvent) -> Result<LocalEvent, StoreError> {
        let now = Utc::now();
        event.id = Uuid::new_v4();
        event.created_at = now;
        event.updated_at = now;

        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update(&self, id: Uuid, mut event: LocalEvent) -> Result<LocalEvent, StoreError> {
        let mut events = self.events.lock().unwrap();
        let slot = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound(id))?;

        event.id = id;
        event.created_at = slot.created_at;
        event.updated_at = Utc::now();
        *slot = event.clone();
        Ok(event)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id);
        Ok(events.len() < before)
    }

    async fn upsert_batch(&self, drafts: &[EventDraft]) -> Result<UpsertStats, StoreError> {
        let mut events = self.events.lock().unwrap();
        Ok(apply_drafts(&mut events, drafts, Utc::now()))
    }
}

/// Ephemeral implementation of [`ConfigStore`].
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Mutex<ConfigState>,
}

#[derive(Default)]
struct ConfigState {
    sync_config: Option<SyncConfig>,
    sync_metadata: Option<SyncMetadata>,
    timezone: Option<String>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor used by tests: window plus timezone in one go.
    pub fn with_config(config: SyncConfig, timezone: &str) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.sync_config = Some(config);
            inner.timezone = Some(timezone.to_string());
        }
        store
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn sync_config(&self) -> Result<Option<SyncConfig>, StoreError> {
        Ok(self.inner.lock().unwrap().sync_config)
    }

    async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError> {
        self.inner.lock().unwrap().sync_config = Some(*config);
        Ok(())
    }

    async fn sync_metadata(&self) -> Result<Option<SyncMetadata>, StoreError> {
        Ok(self.inner.lock().unwrap().sync_metadata.clone())
    }

    async fn set_sync_metadata(&self, metadata: &SyncMetadata) -> Result<(), StoreError> {
        self.inner.lock().unwrap().sync_metadata = Some(metadata.clone());
        Ok(())
    }

    async fn timezone(&self) -> Result<String, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .timezone
            .clone()
            .unwrap_or_else(|| "UTC".to_string()))
    }

    async fn set_timezone(&self, timezone: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().timezone = Some(timezone.to_string());
        Ok(())
    }
}
