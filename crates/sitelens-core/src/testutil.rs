//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit and integration tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::models::{CheckResult, PageSignals};
use crate::pool::ResultSink;
use crate::traits::{FetchResponse, Fetcher, PageAnalyzer, SitemapDocument, SitemapParser};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// What a mocked URL answers with.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Response(FetchResponse),
    Timeout,
    NetworkError(String),
    /// Panics inside `fetch`, for exercising worker fault handling.
    Panic,
}

impl MockOutcome {
    pub fn response(status: u16, content_type: &str, body: &str) -> Self {
        MockOutcome::Response(FetchResponse {
            status,
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
struct MockRoute {
    outcome: Option<MockOutcome>,
    delay: Duration,
}

/// Mock fetcher with per-URL canned outcomes and delays.
///
/// URLs without a configured outcome answer `200 text/html` with a page
/// containing one `<h1>`.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, MockRoute>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, outcome: MockOutcome) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .outcome = Some(outcome);
        self
    }

    pub fn html(self, url: &str, body: &str) -> Self {
        self.respond(url, MockOutcome::response(200, "text/html; charset=utf-8", body))
    }

    pub fn xml(self, url: &str, body: &str) -> Self {
        self.respond(url, MockOutcome::response(200, "application/xml", body))
    }

    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .delay = delay;
        self
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let route = self.routes.lock().unwrap().get(url).cloned().unwrap_or_default();

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        match route.outcome {
            None => Ok(FetchResponse {
                status: 200,
                content_type: Some("text/html".to_string()),
                body: format!(
                    "<html><head><title>{url}</title></head><body><h1>{url}</h1></body></html>"
                ),
            }),
            Some(MockOutcome::Response(response)) => Ok(response),
            Some(MockOutcome::Timeout) => Err(AppError::Timeout(0)),
            Some(MockOutcome::NetworkError(msg)) => Err(AppError::NetworkError(msg)),
            Some(MockOutcome::Panic) => panic!("mock fetcher panicked for {url}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

/// Counts `<h1` tags and derives the remaining fields from the URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockAnalyzer;

impl PageAnalyzer for MockAnalyzer {
    fn analyze(&self, html: &str, url: &str) -> Result<PageSignals, AppError> {
        if !html.contains("<html") {
            return Err(AppError::NotHtml);
        }
        let h1_count = html.matches("<h1").count();
        Ok(PageSignals {
            title: format!("Title of {url}"),
            h1_count,
            h1_text: if h1_count > 0 {
                format!("Heading of {url}")
            } else {
                String::new()
            },
            ..PageSignals::default()
        })
    }
}

// ---------------------------------------------------------------------------
// LineSitemapParser
// ---------------------------------------------------------------------------

/// Parses a line format instead of XML: `sitemap <url>` and `page <url>`.
/// A document containing `!invalid` fails to parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSitemapParser;

impl SitemapParser for LineSitemapParser {
    fn parse(&self, body: &str, base_url: &str) -> Result<SitemapDocument, AppError> {
        if body.contains("!invalid") {
            return Err(AppError::SitemapError(format!("unparseable sitemap {base_url}")));
        }
        let mut doc = SitemapDocument::default();
        for line in body.lines().map(str::trim) {
            if let Some(url) = line.strip_prefix("sitemap ") {
                doc.sitemaps.push(url.trim().to_string());
            } else if let Some(url) = line.strip_prefix("page ") {
                doc.pages.push(url.trim().to_string());
            }
        }
        Ok(doc)
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Result sink that records deliveries in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    results: Mutex<Vec<(usize, CheckResult)>>,
    stop_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop once `n` results have been delivered.
    pub fn stop_after(n: usize) -> Self {
        Self {
            stop_after: Some(n),
            ..Self::default()
        }
    }

    pub fn results(&self) -> Vec<(usize, CheckResult)> {
        self.results.lock().unwrap().clone()
    }

    /// Results sorted by input index.
    pub fn by_index(&self) -> Vec<CheckResult> {
        let mut results = self.results();
        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, r)| r).collect()
    }
}

impl ResultSink for RecordingSink {
    fn should_stop(&self) -> bool {
        self.stop_after
            .is_some_and(|n| self.results.lock().unwrap().len() >= n)
    }

    fn deliver(&self, index: usize, result: CheckResult) {
        self.results.lock().unwrap().push((index, result));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drain a channel observer until its sender is closed.
pub async fn collect_events<E>(rx: &mut mpsc::UnboundedReceiver<E>) -> Vec<E> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
