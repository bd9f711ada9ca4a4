//! Test doubles for the sync engine.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::remote::{CalendarSource, CalendarViewQuery, EventPage, RemoteError};
use crate::store::{
    EventDraft, EventStore, LocalEvent, MemoryEventStore, StoreError, UpsertStats,
};

/// A `CalendarSource` that serves a scripted sequence of page results.
///
/// Every fetch, regardless of endpoint, consumes the next scripted result in
/// order; the recorded call counts and delta tokens let tests assert what
/// the engine actually asked for.
pub struct ScriptedSource {
    pages: Mutex<VecDeque<Result<EventPage, RemoteError>>>,
    stall_on_exhausted: bool,
    online: AtomicBool,
    fetch_calls: AtomicUsize,
    delta_tokens: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Result<EventPage, RemoteError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            stall_on_exhausted: false,
            online: AtomicBool::new(true),
            fetch_calls: AtomicUsize::new(0),
            delta_tokens: Mutex::new(Vec::new()),
        }
    }

    /// A source whose fetches never resolve, for cancellation tests.
    pub fn stalled() -> Self {
        Self::new(Vec::new()).stall_when_exhausted()
    }

    /// Once the scripted pages run out, further fetches never resolve
    /// instead of serving empty pages.
    pub fn stall_when_exhausted(mut self) -> Self {
        self.stall_on_exhausted = true;
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Total page fetches issued across all endpoints.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Tokens presented to `fetch_delta`, in call order.
    pub fn delta_tokens(&self) -> Vec<Option<String>> {
        self.delta_tokens.lock().unwrap().clone()
    }

    async fn next_page(&self) -> Result<EventPage, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.pages.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None if self.stall_on_exhausted => std::future::pending().await,
            None => Ok(EventPage::default()),
        }
    }
}

#[async_trait]
impl CalendarSource for ScriptedSource {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn fetch_calendar_view(
        &self,
        _query: &CalendarViewQuery,
    ) -> Result<EventPage, RemoteError> {
        self.next_page().await
    }

    async fn fetch_delta(&self, token: Option<&str>) -> Result<EventPage, RemoteError> {
        self.delta_tokens
            .lock()
            .unwrap()
            .push(token.map(str::to_string));
        self.next_page().await
    }

    async fn fetch_next_page(&self, _next_link: &str) -> Result<EventPage, RemoteError> {
        self.next_page().await
    }
}

/// An in-memory store that rejects deletes of one chosen event, for
/// exercising per-item failure tolerance in the cleanup paths.
#[derive(Default)]
pub struct FailingDeleteStore {
    inner: MemoryEventStore,
    deny: Mutex<Option<Uuid>>,
}

impl FailingDeleteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete of `id` fail from now on.
    pub fn deny_delete(&self, id: Uuid) {
        *self.deny.lock().unwrap() = Some(id);
    }
}

#[async_trait]
impl EventStore for FailingDeleteStore {
    async fn list(&self) -> Result<Vec<LocalEvent>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, event: LocalEvent) -> Result<LocalEvent, StoreError> {
        self.inner.create(event).await
    }

    async fn update(&self, id: Uuid, event: LocalEvent) -> Result<LocalEvent, StoreError> {
        self.inner.update(id, event).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        if *self.deny.lock().unwrap() == Some(id) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "delete rejected",
            )));
        }
        self.inner.delete(id).await
    }

    async fn upsert_batch(&self, drafts: &[EventDraft]) -> Result<UpsertStats, StoreError> {
        self.inner.upsert_batch(drafts).await
    }
}
