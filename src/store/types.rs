//! Types for the local event store and configuration boundary.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free/busy status stored with a local event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Free,
    Tentative,
    Busy,
    OutOfOffice,
    WorkingElsewhere,
}

/// A calendar event as persisted locally.
///
/// Start/end are stored timezone-naive; they are interpreted in the user's
/// configured timezone at the orchestrator boundary. `graph_id` links the
/// event to its remote counterpart; events without one are local-only and
/// never touched by sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEvent {
    /// Store-assigned identifier, immutable once assigned.
    pub id: Uuid,
    /// Remote identifier; unique across the store when present.
    #[serde(default)]
    pub graph_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub all_day: bool,
    pub status: EventStatus,
    /// Semicolon-delimited label set.
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub attendees: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl LocalEvent {
    /// Materialize a new local event from a field-mapped remote draft.
    pub fn from_draft(draft: &EventDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph_id: Some(draft.graph_id.clone()),
            title: draft.title.clone(),
            description: draft.description.clone(),
            start: draft.start,
            end: draft.end,
            all_day: draft.all_day,
            status: draft.status,
            categories: draft.categories.clone(),
            location: draft.location.clone(),
            organizer: draft.organizer.clone(),
            attendees: draft.attendees.clone(),
            created_at: now,
            updated_at: now,
            synced_at: Some(now),
        }
    }

    /// Overwrite the synced fields from a draft, leaving identity and
    /// creation time untouched.
    pub fn apply_draft(&mut self, draft: &EventDraft, now: DateTime<Utc>) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.start = draft.start;
        self.end = draft.end;
        self.all_day = draft.all_day;
        self.status = draft.status;
        self.categories = draft.categories.clone();
        self.location = draft.location.clone();
        self.organizer = draft.organizer.clone();
        self.attendees = draft.attendees.clone();
        self.updated_at = now;
        self.synced_at = Some(now);
    }

    /// Whether the synced fields already match the draft. Unchanged events
    /// are not rewritten, which keeps repeated syncs idempotent.
    pub fn matches_draft(&self, draft: &EventDraft) -> bool {
        self.title == draft.title
            && self.description == draft.description
            && self.start == draft.start
            && self.end == draft.end
            && self.all_day == draft.all_day
            && self.status == draft.status
            && self.categories == draft.categories
            && self.location == draft.location
            && self.organizer == draft.organizer
            && self.attendees == draft.attendees
    }
}

/// The field-mapped form of a remote event handed to the store's upsert
/// path; everything of `LocalEvent` except store-assigned identity and
/// bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub graph_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
    pub status: EventStatus,
    pub categories: String,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub attendees: Option<String>,
}

/// Counts reported by a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub created: usize,
    pub updated: usize,
}

/// User-configured sync date window, inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Maximum allowed window span in days.
pub const MAX_WINDOW_DAYS: i64 = 365;

impl SyncConfig {
    /// Check the window invariant: start strictly before end, span at most
    /// [`MAX_WINDOW_DAYS`]. Invalid windows are rejected, never clamped.
    pub fn validate(&self) -> Result<(), String> {
        if self.start_date >= self.end_date {
            return Err(format!(
                "start date {} must be strictly before end date {}",
                self.start_date, self.end_date
            ));
        }
        let span = (self.end_date - self.start_date).num_days();
        if span > MAX_WINDOW_DAYS {
            return Err(format!(
                "window spans {span} days, maximum is {MAX_WINDOW_DAYS}"
            ));
        }
        Ok(())
    }
}

/// Sync checkpoint metadata.
///
/// Created empty on first run and updated only after a successful fetch
/// phase; a failed run never rolls it back. The delta token is opaque and
/// only meaningful together with the local snapshot it was obtained against.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncMetadata {
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delta_token: Option<String>,
    #[serde(default)]
    pub last_modified_seen: Option<DateTime<Utc>>,
}

/// Error types for local persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event not found: {0}")]
    NotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: &str, end: &str) -> SyncConfig {
        SyncConfig {
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
        }
    }

    #[test]
    fn accepts_valid_window() {
        assert!(window("2024-01-01", "2024-01-07").validate().is_ok());
        // Exactly 365 days is still allowed.
        assert!(window("2024-01-01", "2024-12-31").validate().is_ok());
    }

    #[test]
    fn rejects_equal_and_reversed_dates() {
        assert!(window("2024-01-07", "2024-01-07").validate().is_err());
        assert!(window("2024-01-07", "2024-01-01").validate().is_err());
    }

    #[test]
    fn rejects_window_over_a_year() {
        assert!(window("2024-01-01", "2025-01-02").validate().is_err());
    }
}
