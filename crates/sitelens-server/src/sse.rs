//! Server-sent event plumbing for job and crawl streams.
//!
//! Each stream is an unbounded channel fed by an `EventBus` observer. The
//! stream ends when the bus closes the observer after a terminal event.

use std::convert::Infallible;
use std::pin::pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use sitelens_core::events::{ChannelObserver, CrawlEvent, EventBus, StreamEvent};

use crate::state::Crawler;

/// Convert one event into an SSE frame named after the event kind.
pub fn to_sse_event<E: StreamEvent>(event: &E) -> Option<Event> {
    match Event::default().event(event.name()).json_data(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(event = event.name(), error = %e, "Failed to encode event");
            None
        }
    }
}

/// Keep-alive sending `event: ping` with an empty JSON object. Never logged or replayed.
pub fn ping(interval: Duration) -> KeepAlive {
    KeepAlive::new()
        .interval(interval)
        .event(Event::default().event("ping").data("{}"))
}

/// Stream every event received on `rx` until the sending observer is closed.
pub fn event_stream<E: StreamEvent>(
    rx: mpsc::UnboundedReceiver<E>,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = UnboundedReceiverStream::new(rx)
        .filter_map(|event| futures::future::ready(to_sse_event(&event).map(Ok)));

    Sse::new(events).keep_alive(ping(keepalive))
}

/// Run a sitemap crawl in the background and return the receiving end of its event stream.
///
/// The crawl is cancelled once the receiver is dropped (client disconnect); a
/// sitemap fetch already in flight is allowed to finish first.
pub fn spawn_crawl(crawler: Crawler, root: String, max_depth: usize) -> mpsc::UnboundedReceiver<CrawlEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = tx.clone();

    tokio::spawn(async move {
        let mut bus = EventBus::<CrawlEvent>::new();
        bus.attach(Box::new(ChannelObserver::from(tx)));

        let cancel = CancellationToken::new();
        let mut crawl = pin!(crawler.crawl(&root, max_depth, &cancel, |event| {
            bus.emit(event);
        }));

        let outcome = tokio::select! {
            outcome = &mut crawl => outcome,
            _ = watcher.closed() => {
                tracing::debug!(%root, "Crawl stream closed by client");
                cancel.cancel();
                crawl.await
            }
        };
        tracing::debug!(%root, ?outcome, "Crawl stream finished");
    });

    rx
}
