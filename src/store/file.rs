//! File-backed event store.
//!
//! Events are persisted as a single pretty-printed JSON document. Writes go
//! through a temp file followed by a rename so a crash mid-write never
//! leaves a truncated store behind. A store-wide async mutex serializes
//! writers; the engine itself issues mutations sequentially, the lock guards
//! against concurrent engine instances sharing a data directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::types::{EventDraft, LocalEvent, StoreError, UpsertStats};
use super::{EventStore, apply_drafts};

/// JSON-on-disk implementation of [`EventStore`].
pub struct FileEventStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventStore {
    /// Create a store persisting to `events.json` under the data directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("events.json"),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<LocalEvent>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save(&self, events: &[LocalEvent]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(events)?;
        let temp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!("Saved {} events to {:?}", events.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn list(&self) -> Result<Vec<LocalEvent>, StoreError> {
        self.load().await
    }

    async fn create(&self, mut event: LocalEvent) -> Result<LocalEvent, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;

        let now = Utc::now();
        event.id = Uuid::new_v4();
        event.created_at = now;
        event.updated_at = now;

        events.push(event.clone());
        self.save(&events).await?;
        Ok(event)
    }

    async fn update(&self, id: Uuid, mut event: LocalEvent) -> Result<LocalEvent, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;

        let slot = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound(id))?;

        event.id = id;
        event.created_at = slot.created_at;
        event.updated_at = Utc::now();
        *slot = event.clone();

        self.save(&events).await?;
        Ok(event)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;

        let before = events.len();
        events.retain(|e| e.id != id);
        let removed = events.len() < before;

        if removed {
            self.save(&events).await?;
        }
        Ok(removed)
    }

    async fn upsert_batch(&self, drafts: &[EventDraft]) -> Result<UpsertStats, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;

        let stats = apply_drafts(&mut events, drafts, Utc::now());
        if stats.created > 0 || stats.updated > 0 {
            self.save(&events).await?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EventStatus;
    use chrono::NaiveDateTime;

    fn draft(graph_id: &str, title: &str) -> EventDraft {
        let start: NaiveDateTime = "2024-01-03T09:00:00".parse().unwrap();
        EventDraft {
            graph_id: graph_id.into(),
            title: title.into(),
            description: None,
            start,
            end: start + chrono::Duration::minutes(30),
            all_day: false,
            status: EventStatus::Busy,
            categories: String::new(),
            location: None,
            organizer: None,
            attendees: None,
        }
    }

    #[tokio::test]
    async fn upsert_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileEventStore::new(dir.path());
        let stats = store.upsert_batch(&[draft("R1", "Standup")]).await.unwrap();
        assert_eq!(stats, UpsertStats { created: 1, updated: 0 });

        // A second instance over the same directory sees the event.
        let reopened = FileEventStore::new(dir.path());
        let events = reopened.list().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].graph_id.as_deref(), Some("R1"));

        // Re-upserting identical content changes nothing.
        let stats = reopened.upsert_batch(&[draft("R1", "Standup")]).await.unwrap();
        assert_eq!(stats, UpsertStats::default());

        // A changed title counts as an update.
        let stats = reopened
            .upsert_batch(&[draft("R1", "Standup (moved)")])
            .await
            .unwrap();
        assert_eq!(stats, UpsertStats { created: 0, updated: 1 });
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEventStore::new(dir.path());

        store.upsert_batch(&[draft("R1", "Standup")]).await.unwrap();
        let id = store.list().await.unwrap()[0].id;

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_preserves_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEventStore::new(dir.path());

        store.upsert_batch(&[draft("R1", "Standup")]).await.unwrap();
        let stored = store.list().await.unwrap().remove(0);

        let mut edited = stored.clone();
        edited.title = "Renamed".into();
        let updated = store.update(stored.id, edited).await.unwrap();

        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.created_at, stored.created_at);
        assert_eq!(updated.title, "Renamed");

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update(missing, stored).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
