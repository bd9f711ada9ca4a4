//! Sync strategies.
//!
//! Two interchangeable strategies implement one run each: `DateRangeSync`
//! fetches the configured window through the calendar-view endpoint and
//! reconciles it as the full remote truth for that window; `DifferentialSync`
//! continues the delta feed from the stored token and applies only the
//! reported changes. The orchestrator picks between them and owns fallback.

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::remote::{CalendarSource, CalendarViewQuery};
use crate::store::{ConfigStore, EventStore, SyncMetadata};

use super::delta;
use super::events::{EventDispatcher, SyncStage};
use super::paginator::{self, FetchPlan};
use super::progress::ProgressTracker;
use super::reconciler::{ReconcileReport, Reconciler};
use super::types::{ResolvedWindow, SyncError};

/// Everything a strategy needs for one run, borrowed from the orchestrator.
pub struct SyncContext<'a> {
    pub source: &'a dyn CalendarSource,
    pub store: &'a dyn EventStore,
    pub config: &'a dyn ConfigStore,
    pub dispatcher: &'a EventDispatcher,
    pub tracker: &'a mut ProgressTracker,
    pub cancel: watch::Receiver<bool>,
    pub timezone: Tz,
}

/// A synchronization strategy executing one full run against the remote.
#[async_trait]
pub trait SyncStrategy: Send + Sync {
    async fn run(&self, ctx: &mut SyncContext<'_>) -> Result<ReconcileReport, SyncError>;

    fn name(&self) -> &'static str;
}

/// Primary strategy: fetch the configured date window and reconcile it.
pub struct DateRangeSync {
    window: ResolvedWindow,
    /// Re-establish the delta checkpoint after reconciling, so the next run
    /// can go differential. Set when a stored token proved stale.
    refresh_delta_token: bool,
}

impl DateRangeSync {
    pub fn new(window: ResolvedWindow) -> Self {
        Self {
            window,
            refresh_delta_token: false,
        }
    }

    pub fn with_token_refresh(mut self) -> Self {
        self.refresh_delta_token = true;
        self
    }

    /// Walk the delta feed once, discarding its events, purely to obtain a
    /// fresh token. A fetch failure here never fails the run: the window was
    /// already reconciled, and the next run simply stays on the date-range
    /// path. Cancellation is the exception and still terminates the run as
    /// cancelled.
    async fn refresh_token(&self, ctx: &mut SyncContext<'_>) -> Result<(), SyncError> {
        let mut side_tracker = ProgressTracker::new();
        let side_dispatcher = EventDispatcher::new();
        let walk = paginator::fetch_all(
            ctx.source,
            FetchPlan::Delta(None),
            &side_dispatcher,
            &mut side_tracker,
            &mut ctx.cancel,
        )
        .await;

        match walk {
            Ok(walk) => {
                let Some(token) = delta::extract_token(&walk.terminal) else {
                    debug!("Delta walk terminated without a token");
                    return Ok(());
                };
                let mut metadata = read_metadata(ctx).await;
                metadata.delta_token = Some(token);
                if let Err(e) = ctx.config.set_sync_metadata(&metadata).await {
                    warn!("Failed to persist refreshed delta token: {e}");
                } else {
                    info!("Re-established delta checkpoint after full sync");
                }
                Ok(())
            }
            Err(SyncError::Cancelled) => Err(SyncError::Cancelled),
            Err(e) => {
                warn!("Delta token refresh failed: {e}");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SyncStrategy for DateRangeSync {
    async fn run(&self, ctx: &mut SyncContext<'_>) -> Result<ReconcileReport, SyncError> {
        info!(
            "Starting date-range sync: {} to {}",
            self.window.start_local, self.window.end_local
        );
        ctx.dispatcher
            .progress(SyncStage::Fetching, 0, 0, "Fetching calendar events");

        let query = CalendarViewQuery::new(self.window.start_utc, self.window.end_utc);
        let walk = paginator::fetch_all(
            ctx.source,
            FetchPlan::CalendarView(&query),
            ctx.dispatcher,
            ctx.tracker,
            &mut ctx.cancel,
        )
        .await?;

        let mut metadata = read_metadata(ctx).await;
        metadata.last_sync = Some(Utc::now());
        if let Some(seen) = delta::latest_modified(&walk.events) {
            metadata.last_modified_seen = Some(seen);
        }
        ctx.config.set_sync_metadata(&metadata).await?;

        ctx.dispatcher.progress(
            SyncStage::Processing,
            0,
            walk.events.len(),
            &format!("Processing {} events", walk.events.len()),
        );
        let reconciler = Reconciler::new(ctx.store, ctx.timezone, ctx.dispatcher);
        let report = reconciler
            .reconcile_window(&walk.events, &self.window)
            .await?;
        ctx.tracker
            .record_upserts(report.stats.created, report.stats.updated);
        ctx.tracker.record_deleted(report.stats.deleted);

        if self.refresh_delta_token {
            self.refresh_token(ctx).await?;
        }

        Ok(report)
    }

    fn name(&self) -> &'static str {
        "date_range"
    }
}

/// Secondary strategy: apply only the changes since the stored checkpoint.
pub struct DifferentialSync {
    token: Option<String>,
}

impl DifferentialSync {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl SyncStrategy for DifferentialSync {
    async fn run(&self, ctx: &mut SyncContext<'_>) -> Result<ReconcileReport, SyncError> {
        info!(
            "Starting differential sync (checkpoint: {})",
            if self.token.is_some() { "stored" } else { "none" }
        );
        ctx.dispatcher
            .progress(SyncStage::Fetching, 0, 0, "Fetching changed events");

        let walk = paginator::fetch_all(
            ctx.source,
            FetchPlan::Delta(self.token.as_deref()),
            ctx.dispatcher,
            ctx.tracker,
            &mut ctx.cancel,
        )
        .await?;

        // Persist the new checkpoint before reconciling; reconciliation is
        // idempotent, so a crash between the two at worst re-applies events.
        let mut metadata = read_metadata(ctx).await;
        metadata.last_sync = Some(Utc::now());
        metadata.delta_token = delta::extract_token(&walk.terminal);
        if let Some(seen) = delta::latest_modified(&walk.events) {
            metadata.last_modified_seen = Some(seen);
        }
        ctx.config.set_sync_metadata(&metadata).await?;

        ctx.dispatcher.progress(
            SyncStage::Processing,
            0,
            walk.events.len(),
            &format!("Processing {} changes", walk.events.len()),
        );
        let reconciler = Reconciler::new(ctx.store, ctx.timezone, ctx.dispatcher);
        // Without a checkpoint the walk enumerated the full feed, so absent
        // events are deletions rather than merely unchanged.
        let report = reconciler
            .reconcile_delta(&walk.events, self.token.is_none())
            .await?;
        ctx.tracker
            .record_upserts(report.stats.created, report.stats.updated);
        ctx.tracker.record_deleted(report.stats.deleted);

        Ok(report)
    }

    fn name(&self) -> &'static str {
        "differential"
    }
}

async fn read_metadata(ctx: &SyncContext<'_>) -> SyncMetadata {
    match ctx.config.sync_metadata().await {
        Ok(metadata) => metadata.unwrap_or_default(),
        Err(e) => {
            warn!("Failed to read sync metadata, starting fresh: {e}");
            SyncMetadata::default()
        }
    }
}
