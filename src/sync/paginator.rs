//! Remote pagination.
//!
//! Walks a paginated API response sequence to exhaustion, following next
//! links until none remain and accumulating events in arrival order. Every
//! page fetch races the run's cancellation channel; a fetch failure aborts
//! the whole walk with the underlying error, leaving retry policy to the
//! orchestrator.

use tokio::sync::watch;
use tracing::debug;

use crate::remote::{CalendarSource, CalendarViewQuery, EventPage, RemoteError, RemoteEvent};

use super::events::{EventDispatcher, SyncStage};
use super::progress::ProgressTracker;
use super::types::SyncError;

/// Which endpoint to start the walk from.
pub enum FetchPlan<'a> {
    /// Date-bounded calendar view, ordered by last-modified descending.
    CalendarView(&'a CalendarViewQuery),
    /// Delta feed, optionally continuing from a stored token.
    Delta(Option<&'a str>),
}

/// The outcome of an exhausted page walk.
pub struct PageWalk {
    /// All events in arrival order.
    pub events: Vec<RemoteEvent>,
    /// The terminal page, kept because it may carry a delta link.
    pub terminal: EventPage,
}

/// Fetch every page of the plan, reporting progress after each one.
///
/// Progress events carry `completed` = events accumulated so far and
/// `total` = 0, since the remote does not report a count.
pub async fn fetch_all(
    source: &dyn CalendarSource,
    plan: FetchPlan<'_>,
    dispatcher: &EventDispatcher,
    tracker: &mut ProgressTracker,
    cancel: &mut watch::Receiver<bool>,
) -> Result<PageWalk, SyncError> {
    let first = match plan {
        FetchPlan::CalendarView(query) => {
            race_cancel(source.fetch_calendar_view(query), cancel).await?
        }
        FetchPlan::Delta(token) => race_cancel(source.fetch_delta(token), cancel).await?,
    };

    let mut events = Vec::new();
    let mut page = first;

    loop {
        debug!(
            "Fetched page with {} events, next link: {}",
            page.value.len(),
            page.next_link.is_some()
        );

        tracker.record_page(page.value.len());
        events.extend(page.value.drain(..));
        tracker.log_progress();

        dispatcher.progress(
            SyncStage::Fetching,
            events.len(),
            0,
            &format!("Fetched {} events", events.len()),
        );

        let Some(next_link) = page.next_link.take() else {
            break;
        };
        page = race_cancel(source.fetch_next_page(&next_link), cancel).await?;
    }

    Ok(PageWalk {
        events,
        terminal: page,
    })
}

/// Await a page fetch unless the run is cancelled first. The cancellation
/// channel only ever transitions false -> true, so any observed change (or
/// a dropped sender) means the run is being torn down.
async fn race_cancel<F>(fut: F, cancel: &mut watch::Receiver<bool>) -> Result<EventPage, SyncError>
where
    F: Future<Output = Result<EventPage, RemoteError>>,
{
    if *cancel.borrow() {
        return Err(SyncError::Cancelled);
    }

    tokio::select! {
        page = fut => Ok(page?),
        _ = cancel.changed() => Err(SyncError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::events::SyncEvent;
    use crate::sync::testing::ScriptedSource;

    fn event(id: &str) -> RemoteEvent {
        serde_json::from_value(serde_json::json!({ "id": id, "subject": id })).unwrap()
    }

    fn page(ids: &[&str], next: Option<&str>, delta: Option<&str>) -> EventPage {
        EventPage {
            value: ids.iter().map(|id| event(id)).collect(),
            next_link: next.map(str::to_string),
            delta_link: delta.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn walks_next_links_to_exhaustion_in_order() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["a", "b"], Some("page2"), None)),
            Ok(page(&["c"], Some("page3"), None)),
            Ok(page(&["d"], None, Some("https://x/delta?$deltatoken=t1"))),
        ]);
        let dispatcher = EventDispatcher::new();
        let (_id, mut rx) = dispatcher.subscribe();
        let mut tracker = ProgressTracker::new();
        let (_tx, mut cancel) = watch::channel(false);

        let walk = fetch_all(
            &source,
            FetchPlan::Delta(None),
            &dispatcher,
            &mut tracker,
            &mut cancel,
        )
        .await
        .unwrap();

        let ids: Vec<_> = walk.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert!(walk.terminal.delta_link.is_some());
        assert_eq!(tracker.events_fetched(), 4);

        // One progress event per page, with a running completed count and
        // an unknown total.
        let mut completed = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                SyncEvent::Progress { stage, completed: c, total, .. } => {
                    assert_eq!(stage, SyncStage::Fetching);
                    assert_eq!(total, 0);
                    completed.push(c);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(completed, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn page_failure_aborts_the_walk() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["a"], Some("page2"), None)),
            Err(RemoteError::Api {
                status: 503,
                message: "unavailable".into(),
            }),
        ]);
        let dispatcher = EventDispatcher::new();
        let mut tracker = ProgressTracker::new();
        let (_tx, mut cancel) = watch::channel(false);

        let result = fetch_all(
            &source,
            FetchPlan::Delta(None),
            &dispatcher,
            &mut tracker,
            &mut cancel,
        )
        .await;

        assert!(matches!(result, Err(SyncError::Fetch(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_pending_fetch() {
        // A source that never resolves its first page.
        let source = ScriptedSource::stalled();
        let dispatcher = EventDispatcher::new();
        let mut tracker = ProgressTracker::new();
        let (tx, mut cancel) = watch::channel(false);

        let walk = fetch_all(
            &source,
            FetchPlan::Delta(None),
            &dispatcher,
            &mut tracker,
            &mut cancel,
        );
        tokio::pin!(walk);

        tokio::select! {
            _ = &mut walk => panic!("walk should still be pending"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => {}
        }

        tx.send(true).unwrap();
        assert!(matches!(walk.await, Err(SyncError::Cancelled)));
    }
}
