//! Reconciliation of fetched remote batches against the local store.
//!
//! Two entry points correspond to the two sync strategies: date-range
//! reconciliation upserts the batch and then prunes, strictly inside the
//! synced window, locals whose remote counterpart disappeared; differential
//! reconciliation applies tombstones and upserts the remaining valid
//! events, pruning store-wide only in full mode. Both paths are idempotent:
//! an unchanged remote state reconciles to zero counts.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::remote::{EmailAddress, RemoteDateTime, RemoteEvent, ShowAs};
use crate::store::{EventDraft, EventStatus, EventStore, LocalEvent};

use super::events::{EventDispatcher, SyncStage};
use super::types::{ResolvedWindow, SyncError, SyncStats};

/// Title given to remote events arriving without a subject.
const UNTITLED: &str = "(no subject)";

/// Reconciliation counts plus the per-item failures that did not abort the
/// batch.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub stats: SyncStats,
    pub errors: Vec<String>,
}

/// Computes create/update/delete operations for a fetched batch and issues
/// them against the local store.
pub struct Reconciler<'a> {
    store: &'a dyn EventStore,
    timezone: Tz,
    dispatcher: &'a EventDispatcher,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn EventStore, timezone: Tz, dispatcher: &'a EventDispatcher) -> Self {
        Self {
            store,
            timezone,
            dispatcher,
        }
    }

    /// Date-range reconciliation: upsert everything, then delete locals
    /// inside the window whose remote id is gone from the batch.
    ///
    /// The window is a hard safety boundary: locals starting outside it are
    /// never deleted regardless of remote state, and locals without a
    /// remote id are never touched at all.
    pub async fn reconcile_window(
        &self,
        batch: &[RemoteEvent],
        window: &ResolvedWindow,
    ) -> Result<ReconcileReport, SyncError> {
        let mut report = ReconcileReport::default();
        report.stats.total = batch.len();

        let drafts: Vec<EventDraft> = batch.iter().map(|e| self.map_event(e)).collect();

        self.dispatcher.progress(
            SyncStage::Saving,
            0,
            batch.len(),
            &format!("Saving {} events", drafts.len()),
        );
        let upserts = self.store.upsert_batch(&drafts).await?;
        report.stats.created = upserts.created;
        report.stats.updated = upserts.updated;

        self.dispatcher
            .progress(SyncStage::Cleaning, 0, 0, "Removing stale events");
        let remote_ids: HashSet<&str> = batch.iter().map(|e| e.id.as_str()).collect();
        for local in self.store.list().await? {
            let Some(graph_id) = local.graph_id.as_deref() else {
                continue;
            };
            if remote_ids.contains(graph_id) || !window.contains_local(local.start) {
                continue;
            }
            if self.delete_logged(&local, &mut report.errors).await {
                report.stats.deleted += 1;
            }
        }

        info!("Date-range reconciliation: {}", report.stats.summary());
        Ok(report)
    }

    /// Differential reconciliation: apply tombstones, upsert the valid
    /// events, and in full mode prune every synced local whose remote id is
    /// absent from the batch, store-wide.
    pub async fn reconcile_delta(
        &self,
        batch: &[RemoteEvent],
        full: bool,
    ) -> Result<ReconcileReport, SyncError> {
        let mut report = ReconcileReport::default();
        report.stats.total = batch.len();

        let (tombstones, valid): (Vec<&RemoteEvent>, Vec<&RemoteEvent>) = batch
            .iter()
            .filter(|e| e.is_tombstone() || e.has_content())
            .partition(|e| e.is_tombstone());

        let drafts: Vec<EventDraft> = valid.iter().map(|e| self.map_event(e)).collect();

        self.dispatcher.progress(
            SyncStage::Saving,
            0,
            batch.len(),
            &format!("Saving {} events", drafts.len()),
        );
        let upserts = self.store.upsert_batch(&drafts).await?;
        report.stats.created = upserts.created;
        report.stats.updated = upserts.updated;

        self.dispatcher
            .progress(SyncStage::Cleaning, 0, 0, "Removing deleted events");

        let by_graph_id: HashMap<String, LocalEvent> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter_map(|e| e.graph_id.clone().map(|gid| (gid, e)))
            .collect();

        for tombstone in &tombstones {
            // Unknown tombstones are already absent locally; nothing to do.
            let Some(local) = by_graph_id.get(&tombstone.id) else {
                continue;
            };
            if self.delete_logged(local, &mut report.errors).await {
                report.stats.deleted += 1;
            }
        }

        if full {
            let valid_ids: HashSet<&str> = valid.iter().map(|e| e.id.as_str()).collect();
            for (graph_id, local) in &by_graph_id {
                if valid_ids.contains(graph_id.as_str()) {
                    continue;
                }
                if tombstones.iter().any(|t| t.id == *graph_id) {
                    continue; // handled above
                }
                if self.delete_logged(local, &mut report.errors).await {
                    report.stats.deleted += 1;
                }
            }
        }

        info!("Differential reconciliation: {}", report.stats.summary());
        Ok(report)
    }

    /// Map a remote event into its local field representation.
    pub fn map_event(&self, remote: &RemoteEvent) -> EventDraft {
        // Missing start/end default to the current instant so start stays
        // non-nullable in the store.
        let now = Utc::now().with_timezone(&self.timezone).naive_local();

        EventDraft {
            graph_id: remote.id.clone(),
            title: remote
                .subject
                .clone()
                .unwrap_or_else(|| UNTITLED.to_string()),
            description: remote.body.as_ref().and_then(|b| b.content.clone()),
            start: self.to_local(remote.start.as_ref()).unwrap_or(now),
            end: self.to_local(remote.end.as_ref()).unwrap_or(now),
            all_day: remote.is_all_day,
            status: map_status(remote.show_as),
            categories: remote.categories.join(";"),
            location: remote
                .location
                .as_ref()
                .and_then(|l| l.display_name.clone()),
            organizer: remote
                .organizer
                .as_ref()
                .map(|o| format_address(&o.email_address)),
            attendees: remote.attendees.as_ref().map(|attendees| {
                attendees
                    .iter()
                    .map(|a| {
                        let response = a
                            .status
                            .as_ref()
                            .and_then(|s| s.response.as_deref())
                            .unwrap_or("none");
                        format!("{}: {}", format_address(&a.email_address), response)
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            }),
        }
    }

    fn to_local(&self, wire: Option<&RemoteDateTime>) -> Option<NaiveDateTime> {
        wire.and_then(|w| w.to_utc())
            .map(|utc| utc.with_timezone(&self.timezone).naive_local())
    }

    /// Delete one local event, tolerating per-item store failures: a failed
    /// delete is logged and reported but never aborts the batch, and does
    /// not count toward the deleted tally.
    async fn delete_logged(&self, event: &LocalEvent, errors: &mut Vec<String>) -> bool {
        match self.store.delete(event.id).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!("Failed to delete event {} ({}): {}", event.id, event.title, e);
                errors.push(format!("delete {}: {e}", event.id));
                false
            }
        }
    }
}

fn map_status(show_as: Option<ShowAs>) -> EventStatus {
    match show_as {
        Some(ShowAs::Free) => EventStatus::Free,
        Some(ShowAs::Tentative) => EventStatus::Tentative,
        Some(ShowAs::Oof) => EventStatus::OutOfOffice,
        Some(ShowAs::WorkingElsewhere) => EventStatus::WorkingElsewhere,
        // The default status; also covers events the remote marks unknown.
        Some(ShowAs::Busy) | Some(ShowAs::Unknown) | None => EventStatus::Busy,
    }
}

fn format_address(address: &EmailAddress) -> String {
    match (address.name.as_deref(), address.address.as_deref()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (Some(name), None) => name.to_string(),
        (None, Some(email)) => email.to_string(),
        (None, None) => String::new(),
    }
}
