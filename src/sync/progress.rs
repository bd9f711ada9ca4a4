//! Progress tracking for calendar synchronization.
//!
//! Tracks fetched event counts and reconciliation statistics for a single
//! sync run, and logs progress as pages arrive. Used by the paginator and
//! the strategies; the orchestrator reads the final snapshot into the
//! terminal result.

use tracing::info;

use super::types::SyncStats;

/// Service for tracking synchronization progress within one run.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    events_fetched: usize,
    pages_fetched: usize,
    stats: SyncStats,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetched page of `count` events.
    pub fn record_page(&mut self, count: usize) {
        self.pages_fetched += 1;
        self.events_fetched += count;
        self.stats.total = self.events_fetched;
    }

    /// Fold reconciliation counts into the run totals.
    pub fn record_upserts(&mut self, created: usize, updated: usize) {
        self.stats.created += created;
        self.stats.updated += updated;
    }

    /// Record locally deleted events.
    pub fn record_deleted(&mut self, count: usize) {
        self.stats.deleted += count;
    }

    pub fn events_fetched(&self) -> usize {
        self.events_fetched
    }

    /// Snapshot of the run statistics so far.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Log progress after a page arrives.
    pub fn log_progress(&self) {
        info!(
            "Sync progress: {} events across {} pages",
            self.events_fetched, self.pages_fetched
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_counts() {
        let mut tracker = ProgressTracker::new();
        tracker.record_page(10);
        tracker.record_page(3);
        tracker.record_upserts(4, 2);
        tracker.record_deleted(1);

        assert_eq!(tracker.events_fetched(), 13);
        let stats = tracker.stats();
        assert_eq!(stats.total, 13);
        assert_eq!(stats.created, 4);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.deleted, 1);
    }
}
