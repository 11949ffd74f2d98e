//! Per-stream event log with live fan-out and replay for late observers.
//!
//! Every event is appended to the log before it is delivered, so an observer
//! attaching at any point sees exactly the sequence earlier observers saw.
//! Callers serialize access (the bus lives inside the owning job's lock).

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::CheckResult;

/// An event that can be logged, replayed and streamed to observers.
pub trait StreamEvent: Clone + Serialize + Send + 'static {
    /// Wire name of the event (`start`, `progress`, ...).
    fn name(&self) -> &'static str;

    /// Terminal events end the stream: nothing is emitted after them.
    fn is_terminal(&self) -> bool;
}

/// Events emitted for a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobEvent {
    Start {
        total: usize,
    },
    Progress {
        index: usize,
        result: CheckResult,
        processed: usize,
        total: usize,
    },
    Done {
        processed: usize,
        total: usize,
    },
    Failed {
        error: String,
    },
}

impl StreamEvent for JobEvent {
    fn name(&self) -> &'static str {
        match self {
            JobEvent::Start { .. } => "start",
            JobEvent::Progress { .. } => "progress",
            JobEvent::Done { .. } => "done",
            JobEvent::Failed { .. } => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Done { .. } | JobEvent::Failed { .. })
    }
}

/// Events emitted by a sitemap crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CrawlEvent {
    Batch { urls: Vec<String>, total: usize },
    Done { total: usize },
    Failed { error: String },
}

impl StreamEvent for CrawlEvent {
    fn name(&self) -> &'static str {
        match self {
            CrawlEvent::Batch { .. } => "batch",
            CrawlEvent::Done { .. } => "done",
            CrawlEvent::Failed { .. } => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, CrawlEvent::Batch { .. })
    }
}

/// A subscriber connection, independent of transport.
pub trait Observer<E>: Send {
    /// Deliver one event. Returns `false` once the observer has gone away.
    fn send(&mut self, event: &E) -> bool;

    /// Close the connection. No further events will be sent.
    fn close(&mut self);
}

/// Observer backed by an unbounded channel; closing drops the sender so the
/// receiving side sees end-of-stream.
pub struct ChannelObserver<E> {
    tx: Option<mpsc::UnboundedSender<E>>,
}

impl<E> ChannelObserver<E> {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }
}

impl<E> From<mpsc::UnboundedSender<E>> for ChannelObserver<E> {
    fn from(tx: mpsc::UnboundedSender<E>) -> Self {
        Self { tx: Some(tx) }
    }
}

impl<E: Clone + Send> Observer<E> for ChannelObserver<E> {
    fn send(&mut self, event: &E) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send(event.clone()).is_ok())
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

/// Append-only event log plus the set of live observers.
pub struct EventBus<E> {
    log: Vec<E>,
    observers: Vec<Box<dyn Observer<E>>>,
    closed: bool,
}

impl<E: StreamEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            observers: Vec::new(),
            closed: false,
        }
    }

    /// Append `event` and fan it out.
    ///
    /// A terminal event closes and detaches every observer. Returns `false`
    /// (and records nothing) once a terminal event has been emitted.
    pub fn emit(&mut self, event: E) -> bool {
        if self.closed {
            return false;
        }

        let terminal = event.is_terminal();
        self.log.push(event);
        if let Some(event) = self.log.last() {
            self.observers.retain_mut(|observer| observer.send(event));
        }

        if terminal {
            self.closed = true;
            for mut observer in self.observers.drain(..) {
                observer.close();
            }
        }
        true
    }

    /// Replay the whole log to `observer`, then keep it for live delivery.
    ///
    /// If the stream already ended, the observer is closed after replay and
    /// not retained. Returns whether the observer was retained.
    pub fn attach(&mut self, mut observer: Box<dyn Observer<E>>) -> bool {
        for event in &self.log {
            if !observer.send(event) {
                return false;
            }
        }

        if self.closed {
            observer.close();
            false
        } else {
            self.observers.push(observer);
            true
        }
    }

    pub fn history(&self) -> &[E] {
        &self.log
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<E: StreamEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
