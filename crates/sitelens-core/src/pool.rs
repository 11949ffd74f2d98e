//! Bounded worker pool that checks a URL list.
//!
//! Workers claim indices from a shared atomic cursor, so no index is checked
//! twice and a slow URL only holds up the worker that claimed it.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::error::AppError;
use crate::models::CheckResult;
use crate::traits::{Fetcher, PageAnalyzer};
use crate::util::normalize_url;

/// Receives results from the pool and tells it when to stop.
pub trait ResultSink: Send + Sync + 'static {
    /// Checked before claiming an index and again before delivering a result.
    fn should_stop(&self) -> bool;

    fn deliver(&self, index: usize, result: CheckResult);
}

/// Runs URL checks with a bounded number of concurrent workers.
#[derive(Clone)]
pub struct WorkerPool<F, A>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    fetcher: F,
    analyzer: A,
    request_timeout: Duration,
}

impl<F, A> WorkerPool<F, A>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    pub fn new(fetcher: F, analyzer: A, request_timeout: Duration) -> Self {
        Self {
            fetcher,
            analyzer,
            request_timeout,
        }
    }

    /// `max(1, min(concurrency, total))`
    pub fn worker_count(concurrency: usize, total: usize) -> usize {
        concurrency.min(total).max(1)
    }

    /// Check every URL, delivering each result to `sink` by input index.
    ///
    /// Returns once all workers have exited. A panicking worker aborts the
    /// rest and surfaces as an error carrying the panic message.
    pub async fn run<S: ResultSink>(
        &self,
        urls: Arc<[String]>,
        concurrency: usize,
        sink: Arc<S>,
    ) -> Result<(), AppError> {
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = Self::worker_count(concurrency, urls.len());
        tracing::debug!(workers, total = urls.len(), "Starting worker pool");

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                fetcher: self.fetcher.clone(),
                analyzer: self.analyzer.clone(),
                request_timeout: self.request_timeout,
                urls: Arc::clone(&urls),
                cursor: Arc::clone(&cursor),
                sink: Arc::clone(&sink),
            };
            set.spawn(worker.run());
        }

        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                set.abort_all();
                while set.join_next().await.is_some() {}
                return Err(AppError::Generic(fault_message(err)));
            }
        }

        Ok(())
    }
}

struct Worker<F, A, S> {
    id: usize,
    fetcher: F,
    analyzer: A,
    request_timeout: Duration,
    urls: Arc<[String]>,
    cursor: Arc<AtomicUsize>,
    sink: Arc<S>,
}

impl<F, A, S> Worker<F, A, S>
where
    F: Fetcher,
    A: PageAnalyzer,
    S: ResultSink,
{
    async fn run(self) {
        loop {
            if self.sink.should_stop() {
                break;
            }

            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(url) = self.urls.get(index) else {
                break;
            };

            let result = check_url(&self.fetcher, &self.analyzer, url, self.request_timeout).await;

            if self.sink.should_stop() {
                tracing::debug!(worker = self.id, index, "Stopped; discarding result");
                break;
            }
            self.sink.deliver(index, result);
        }
        tracing::trace!(worker = self.id, "Worker exited");
    }
}

/// Fetch and analyze one URL. Failures are recorded on the result, never returned.
pub async fn check_url<F, A>(fetcher: &F, analyzer: &A, raw_url: &str, timeout: Duration) -> CheckResult
where
    F: Fetcher,
    A: PageAnalyzer,
{
    let url = normalize_url(raw_url);
    let started = Instant::now();

    let fetched = match tokio::time::timeout(timeout, fetcher.fetch(&url, timeout)).await {
        Ok(fetched) => fetched,
        Err(_) => Err(AppError::Timeout(timeout.as_millis() as u64)),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let response = match fetched {
        Ok(response) => response,
        Err(e) => {
            let message = failure_message(&url, &e);
            return CheckResult::failed(url, elapsed_ms, message);
        }
    };

    let result = CheckResult::fetched(url.as_str(), response.status, elapsed_ms);
    if !response.is_html() {
        return result.with_error(AppError::NotHtml.result_message());
    }

    match analyzer.analyze(&response.body, &url) {
        Ok(signals) => result.with_signals(signals),
        Err(e) => result.with_error(failure_message(&url, &e)),
    }
}

/// Errors outside the per-URL kinds are still recorded, but logged as unexpected.
fn failure_message(url: &str, err: &AppError) -> String {
    if !err.is_per_url() {
        tracing::warn!(%url, error = %err, "Unexpected error while checking URL");
    }
    err.result_message()
}

fn fault_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}
