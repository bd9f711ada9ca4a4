//! Event system for calendar synchronization.
//!
//! Progress and completion are delivered as a sequence of discrete events
//! over per-subscriber channels. Each sync run emits any number of
//! `Progress` events followed by exactly one `Completed` event carrying the
//! terminal result. A subscriber that falls behind or drops its receiver is
//! pruned without affecting the other subscribers or the engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use super::types::SyncResult;

/// Pipeline stage a progress event was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetching,
    Processing,
    Saving,
    Cleaning,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            SyncStage::Fetching => "fetching",
            SyncStage::Processing => "processing",
            SyncStage::Saving => "saving",
            SyncStage::Cleaning => "cleaning",
        };
        f.write_str(tag)
    }
}

/// Events that occur during calendar synchronization.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Intermediate progress within a running sync.
    Progress {
        stage: SyncStage,
        /// Items handled so far within the stage.
        completed: usize,
        /// Expected total, 0 when the remote does not report one.
        total: usize,
        message: String,
    },
    /// Terminal event; delivered exactly once per sync run.
    Completed { result: SyncResult },
}

/// Handle identifying a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Event dispatcher delivering sync events to every subscriber.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<SyncEvent>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; events dispatched from now on arrive on the
    /// returned receiver.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().insert(id, tx);
        (SubscriberId(id), rx)
    }

    /// Remove a subscriber; a stale id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().unwrap().remove(&id.0);
    }

    /// Deliver an event to all subscribers. Delivery to one subscriber is
    /// isolated from the rest: a closed channel is pruned, never an error.
    pub fn dispatch(&self, event: &SyncEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|id, tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                debug!("Dropping sync subscriber {id}: receiver closed");
            }
            delivered
        });
    }

    /// Convenience wrapper for progress events.
    pub fn progress(&self, stage: SyncStage, completed: usize, total: usize, message: &str) {
        self.dispatch(&SyncEvent::Progress {
            stage,
            completed,
            total,
            message: message.to_string(),
        });
    }
}
