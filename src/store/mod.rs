//! Local persistence for calendar events and sync configuration.
//!
//! This module defines the storage boundary consumed by the sync engine:
//! the `EventStore` trait for calendar events and the `ConfigStore` trait
//! for the sync window, timezone, and checkpoint metadata. File-backed
//! implementations persist pretty JSON with atomic temp-file + rename
//! writes; in-memory implementations back tests and ephemeral runs.

/// Sync window, timezone, and metadata persistence
mod config;
/// File-backed event store
mod file;
/// In-memory event and config stores
mod memory;
/// Local event and configuration types
mod types;

pub use config::{ConfigStore, FileConfigStore};
pub use file::FileEventStore;
pub use memory::{MemoryConfigStore, MemoryEventStore};
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Local event store boundary consumed by the sync engine.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All stored events.
    async fn list(&self) -> Result<Vec<LocalEvent>, StoreError>;

    /// Persist a new event. The store assigns the identifier and creation
    /// timestamps; the returned copy carries them.
    async fn create(&self, event: LocalEvent) -> Result<LocalEvent, StoreError>;

    /// Replace the stored event with the given id.
    async fn update(&self, id: Uuid, event: LocalEvent) -> Result<LocalEvent, StoreError>;

    /// Remove an event, reporting whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Transactional batch upsert keyed by remote id. An event whose synced
    /// fields already match its draft is left untouched and counted as
    /// neither created nor updated.
    async fn upsert_batch(&self, drafts: &[EventDraft]) -> Result<UpsertStats, StoreError>;
}

/// Upsert-by-remote-id against an in-memory snapshot; shared by the store
/// implementations so both report identical counts.
pub(crate) fn apply_drafts(
    events: &mut Vec<LocalEvent>,
    drafts: &[EventDraft],
    now: DateTime<Utc>,
) -> UpsertStats {
    let mut stats = UpsertStats::default();

    for draft in drafts {
        match events
            .iter_mut()
            .find(|e| e.graph_id.as_deref() == Some(draft.graph_id.as_str()))
        {
            Some(existing) => {
                if !existing.matches_draft(draft) {
                    existing.apply_draft(draft, now);
                    stats.updated += 1;
                }
            }
            None => {
                events.push(LocalEvent::from_draft(draft, now));
                stats.created += 1;
            }
        }
    }

    stats
}
