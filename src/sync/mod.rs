//! Calendar synchronization engine.
//!
//! The engine reconciles a remote Graph-style calendar against the local
//! event store. [`SyncEngine`] is the entry point: it runs one strategy per
//! sync, walks the remote's pages to exhaustion, hands the batch to the
//! reconciler, and reports progress and the terminal result over the event
//! dispatcher. The date-range strategy treats the fetched window as the
//! complete remote truth for that window; the differential strategy applies
//! only the changes since a stored delta checkpoint, falling back to the
//! window fetch when the checkpoint no longer works.

/// Delta token extraction
mod delta;
/// Progress and completion event delivery
mod events;
/// Run orchestration, single-flight and cancellation
mod orchestrator;
/// Page walking against the remote
mod paginator;
/// Per-run progress accounting
mod progress;
/// Batch reconciliation against the local store
mod reconciler;
/// The date-range and differential strategies
mod strategies;
/// Shared result, error and window types
mod types;

#[cfg(test)]
mod testing;

pub use events::{EventDispatcher, SubscriberId, SyncEvent, SyncStage};
pub use orchestrator::{SyncEngine, SyncStatus};
pub use reconciler::{ReconcileReport, Reconciler};
pub use strategies::{DateRangeSync, DifferentialSync, SyncContext, SyncStrategy};
pub use types::{
    ResolvedWindow, RunStatus, StrategyKind, SyncError, SyncResult, SyncStats,
};
