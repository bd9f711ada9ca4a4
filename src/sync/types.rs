//! Shared types for the sync engine: run results, statistics, the error
//! taxonomy, and date-window resolution.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::remote::RemoteError;
use crate::store::{StoreError, SyncConfig};

/// Which strategy a sync run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Primary: fetch and reconcile the configured date window.
    DateRange,
    /// Secondary: token-based fetch of changes since the last checkpoint.
    Differential,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DateRange => "date_range",
            StrategyKind::Differential => "differential",
        }
    }
}

/// Reconciliation counts for a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Remote events fetched, tombstones included.
    pub total: usize,
}

impl SyncStats {
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} updated, {} deleted of {} fetched",
            self.created, self.updated, self.deleted, self.total
        )
    }
}

/// Terminal state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Terminal result of a sync run, delivered once per run through the event
/// bus and returned from `start_sync`.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub status: RunStatus,
    pub strategy: StrategyKind,
    pub stats: SyncStats,
    /// Per-item persistence failures that did not abort the run; empty for
    /// cancelled runs.
    pub errors: Vec<String>,
    pub message: String,
}

impl SyncResult {
    pub fn success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Error types for sync engine operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no network connectivity")]
    Offline,

    #[error("remote fetch failed: {0}")]
    Fetch(#[from] RemoteError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sync already in progress")]
    AlreadyRunning,

    #[error("sync cancelled")]
    Cancelled,

    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),
}

/// The configured date window resolved against the user's timezone.
///
/// `start_utc`/`end_utc` parameterize the remote query; the naive local
/// bounds are what stored event timestamps are compared against, since the
/// store keeps timestamps timezone-naive in the configured zone.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedWindow {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub start_local: NaiveDateTime,
    pub end_local: NaiveDateTime,
}

impl ResolvedWindow {
    /// Resolve a validated config: start-of-day for the start date and
    /// end-of-day for the end date, interpreted in `tz`.
    pub fn resolve(config: &SyncConfig, tz: Tz) -> Result<Self, SyncError> {
        config.validate().map_err(SyncError::InvalidConfig)?;

        let start_local = config
            .start_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SyncError::InvalidConfig("invalid start of day".into()))?;
        let end_local = config
            .end_date
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| SyncError::InvalidConfig("invalid end of day".into()))?;

        Ok(Self {
            start_utc: to_utc(tz, start_local)?,
            end_utc: to_utc(tz, end_local)?,
            start_local,
            end_local,
        })
    }

    /// Whether a stored (naive, configured-zone) timestamp lies inside the
    /// window, inclusive on both ends.
    pub fn contains_local(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start_local && ts <= self.end_local
    }
}

fn to_utc(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>, SyncError> {
    // DST gaps make some local times unrepresentable; take the earlier of
    // an ambiguous pair and reject nonexistent times outright.
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            SyncError::InvalidConfig(format!("local time {local} does not exist in {tz}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start: &str, end: &str) -> SyncConfig {
        SyncConfig {
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
        }
    }

    #[test]
    fn resolves_window_in_named_zone() {
        let window = ResolvedWindow::resolve(
            &config("2024-01-01", "2024-01-07"),
            chrono_tz::Europe::Berlin,
        )
        .unwrap();

        // Berlin is UTC+1 in January.
        assert_eq!(
            window.start_utc,
            "2023-12-31T23:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            window.end_utc,
            "2024-01-07T22:59:59Z".parse::<DateTime<Utc>>().unwrap()
        );

        assert!(window.contains_local("2024-01-03T09:00:00".parse().unwrap()));
        assert!(window.contains_local("2024-01-01T00:00:00".parse().unwrap()));
        assert!(window.contains_local("2024-01-07T23:59:59".parse().unwrap()));
        assert!(!window.contains_local("2024-01-08T00:00:00".parse().unwrap()));
    }

    #[test]
    fn rejects_invalid_config() {
        let err = ResolvedWindow::resolve(&config("2024-01-07", "2024-01-01"), chrono_tz::UTC);
        assert!(matches!(err, Err(SyncError::InvalidConfig(_))));
    }
}
