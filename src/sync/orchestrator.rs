//! Sync orchestration.
//!
//! `SyncEngine` owns the engine-wide pieces: the remote source, the local
//! stores, the event dispatcher, and the single-flight/cancellation state.
//! One call to [`SyncEngine::start_sync`] is one run: it picks a strategy,
//! executes it, falls back from differential to date-range when the stored
//! checkpoint proves unusable, and always delivers exactly one `Completed`
//! event carrying the terminal result.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::remote::CalendarSource;
use crate::store::{ConfigStore, EventStore, SyncConfig};

use super::events::{EventDispatcher, SubscriberId, SyncEvent};
use super::progress::ProgressTracker;
use super::strategies::{DateRangeSync, DifferentialSync, SyncContext, SyncStrategy};
use super::types::{ResolvedWindow, RunStatus, StrategyKind, SyncError, SyncResult, SyncStats};

/// Snapshot of the engine's current state for UIs and health endpoints.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub is_active: bool,
    pub last_sync: Option<DateTime<Utc>>,
    /// Whether a run could start right now: a valid window is configured
    /// and no run is in flight.
    pub can_sync: bool,
}

/// Orchestrates calendar synchronization runs.
pub struct SyncEngine {
    source: Arc<dyn CalendarSource>,
    store: Arc<dyn EventStore>,
    config: Arc<dyn ConfigStore>,
    dispatcher: EventDispatcher,
    active: AtomicBool,
    cancel_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        store: Arc<dyn EventStore>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            source,
            store,
            config,
            dispatcher: EventDispatcher::new(),
            active: AtomicBool::new(false),
            cancel_tx: Mutex::new(None),
        }
    }

    /// Register for progress and completion events.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<SyncEvent>) {
        self.dispatcher.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.dispatcher.unsubscribe(id);
    }

    pub fn is_syncing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Request cancellation of the run in flight, reporting whether there
    /// was one. The run still terminates through its own `Completed` event.
    pub fn cancel_sync(&self) -> bool {
        let guard = self.cancel_tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                info!("Cancellation requested");
                tx.send(true).is_ok()
            }
            None => false,
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let is_active = self.is_syncing();
        let last_sync = match self.config.sync_metadata().await {
            Ok(metadata) => metadata.and_then(|m| m.last_sync),
            Err(_) => None,
        };
        let configured = matches!(
            self.config.sync_config().await,
            Ok(Some(config)) if config.validate().is_ok()
        );

        SyncStatus {
            is_active,
            last_sync,
            can_sync: configured && !is_active,
        }
    }

    /// Validate a window without persisting it.
    pub fn validate_config(config: &SyncConfig) -> Result<(), SyncError> {
        config.validate().map_err(SyncError::InvalidConfig)
    }

    /// Validate and persist a new sync window. Rejection happens before any
    /// write; an invalid window never reaches the config store.
    pub async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), SyncError> {
        Self::validate_config(config)?;
        self.config.set_sync_config(config).await?;
        Ok(())
    }

    /// Execute one sync run.
    ///
    /// Only one run may be in flight; a second call returns
    /// [`SyncError::AlreadyRunning`] without touching the active run. Every
    /// other outcome, failures included, is reported as a terminal
    /// [`SyncResult`] and dispatched as exactly one `Completed` event.
    ///
    /// `force_full` skips the differential path even when a checkpoint is
    /// stored.
    pub async fn start_sync(&self, force_full: bool) -> Result<SyncResult, SyncError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *self.cancel_tx.lock().unwrap() = Some(cancel_tx);

        let result = self.execute(force_full, cancel_rx).await;

        *self.cancel_tx.lock().unwrap() = None;
        self.active.store(false, Ordering::SeqCst);

        info!("Sync finished: {:?} ({})", result.status, result.message);
        self.dispatcher.dispatch(&SyncEvent::Completed {
            result: result.clone(),
        });
        Ok(result)
    }

    async fn execute(&self, force_full: bool, cancel: watch::Receiver<bool>) -> SyncResult {
        if !self.source.is_online().await {
            return failed(StrategyKind::DateRange, &SyncError::Offline.to_string());
        }

        let timezone = match self.resolve_timezone().await {
            Ok(tz) => tz,
            Err(e) => return failed(StrategyKind::DateRange, &e.to_string()),
        };
        let window = match self.resolve_window(timezone).await {
            Ok(window) => window,
            Err(e) => return failed(StrategyKind::DateRange, &e.to_string()),
        };

        let token = match self.config.sync_metadata().await {
            Ok(metadata) => metadata.and_then(|m| m.delta_token),
            Err(e) => {
                warn!("Failed to read sync metadata, ignoring checkpoint: {e}");
                None
            }
        };

        let mut tracker = ProgressTracker::new();

        if token.is_some() && !force_full {
            let strategy = DifferentialSync::new(token);
            match self.run_strategy(&strategy, &mut tracker, &cancel, timezone).await {
                Ok(report) => {
                    return completed(StrategyKind::Differential, tracker.stats(), report.errors);
                }
                Err(SyncError::Cancelled) => return cancelled(StrategyKind::Differential),
                Err(e) => {
                    // A stale or rejected checkpoint falls back to the
                    // window fetch, which also re-establishes the token.
                    warn!("Differential sync failed, falling back to date-range: {e}");
                    tracker = ProgressTracker::new();
                }
            }
        }

        let strategy = DateRangeSync::new(window).with_token_refresh();
        match self.run_strategy(&strategy, &mut tracker, &cancel, timezone).await {
            Ok(report) => completed(StrategyKind::DateRange, tracker.stats(), report.errors),
            Err(SyncError::Cancelled) => cancelled(StrategyKind::DateRange),
            Err(e) => failed(StrategyKind::DateRange, &e.to_string()),
        }
    }

    async fn run_strategy(
        &self,
        strategy: &dyn SyncStrategy,
        tracker: &mut ProgressTracker,
        cancel: &watch::Receiver<bool>,
        timezone: Tz,
    ) -> Result<super::reconciler::ReconcileReport, SyncError> {
        let mut ctx = SyncContext {
            source: self.source.as_ref(),
            store: self.store.as_ref(),
            config: self.config.as_ref(),
            dispatcher: &self.dispatcher,
            tracker,
            cancel: cancel.clone(),
            timezone,
        };
        strategy.run(&mut ctx).await
    }

    async fn resolve_timezone(&self) -> Result<Tz, SyncError> {
        let name = self.config.timezone().await?;
        Tz::from_str(&name)
            .map_err(|_| SyncError::InvalidConfig(format!("unknown timezone {name}")))
    }

    async fn resolve_window(&self, timezone: Tz) -> Result<ResolvedWindow, SyncError> {
        let config = self
            .config
            .sync_config()
            .await?
            .ok_or_else(|| SyncError::InvalidConfig("sync window not configured".into()))?;
        ResolvedWindow::resolve(&config, timezone)
    }
}

fn completed(strategy: StrategyKind, stats: SyncStats, errors: Vec<String>) -> SyncResult {
    SyncResult {
        status: RunStatus::Completed,
        strategy,
        message: stats.summary(),
        stats,
        errors,
    }
}

fn cancelled(strategy: StrategyKind) -> SyncResult {
    SyncResult {
        status: RunStatus::Cancelled,
        strategy,
        stats: SyncStats::default(),
        errors: Vec::new(),
        message: "sync cancelled".into(),
    }
}

fn failed(strategy: StrategyKind, message: &str) -> SyncResult {
    SyncResult {
        status: RunStatus::Failed,
        strategy,
        stats: SyncStats::default(),
        errors: Vec::new(),
        message: message.to_string(),
    }
}
