//! Breadth-first discovery of page URLs through sitemap-index trees.
//!
//! The crawl fails fast: one sitemap document that cannot be fetched or parsed
//! ends the whole traversal with a `failed` event.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::events::CrawlEvent;
use crate::traits::{Fetcher, SitemapDocument, SitemapParser};
use crate::util::normalize_url;

/// Configuration for sitemap crawls.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Depth used when a request does not specify one. The root is depth 0.
    pub max_depth: usize,
    /// Hard cap on requested depth.
    pub max_depth_limit: usize,
    /// Maximum number of URLs per `batch` event.
    pub batch_size: usize,
    /// Timeout for fetching one sitemap document.
    pub fetch_timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_depth_limit: 10,
            batch_size: 200,
            fetch_timeout: Duration::from_secs(20),
        }
    }
}

impl CrawlConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn resolve_depth(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.max_depth)
            .min(self.max_depth_limit)
    }
}

/// How a crawl ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed { total: usize },
    Failed { error: String },
    /// Stopped by the caller; no terminal event was emitted.
    Cancelled { total: usize },
}

struct CrawlState {
    visited: HashSet<String>,
    seen: HashSet<String>,
    queue: VecDeque<(String, usize)>,
    max_depth: usize,
    total: usize,
}

impl CrawlState {
    fn new(root: String, max_depth: usize) -> Self {
        Self {
            visited: HashSet::new(),
            seen: HashSet::new(),
            queue: VecDeque::from([(root, 0)]),
            max_depth,
            total: 0,
        }
    }

    fn enqueue_children(&mut self, sitemaps: Vec<String>, depth: usize) {
        if depth >= self.max_depth {
            return;
        }
        for child in sitemaps {
            if !self.visited.contains(&child) {
                self.queue.push_back((child, depth + 1));
            }
        }
    }

    /// Page URLs not seen before, in document order.
    fn fresh_pages(&mut self, pages: Vec<String>) -> Vec<String> {
        pages
            .into_iter()
            .filter(|page| self.seen.insert(page.clone()))
            .collect()
    }
}

/// Normalize the root the same way parsed `<loc>` references are.
fn canonical_root(raw: &str) -> String {
    let root = normalize_url(raw);
    match Url::parse(&root) {
        Ok(url) => url.to_string(),
        Err(_) => root,
    }
}

/// Walks sitemap indexes and streams newly discovered page URLs.
#[derive(Clone)]
pub struct SitemapCrawler<F, P>
where
    F: Fetcher,
    P: SitemapParser,
{
    fetcher: F,
    parser: P,
    config: CrawlConfig,
}

impl<F, P> SitemapCrawler<F, P>
where
    F: Fetcher,
    P: SitemapParser,
{
    pub fn new(fetcher: F, parser: P, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            parser,
            config,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl from `root`, handing each event to `emit`.
    ///
    /// Emits `batch` events followed by exactly one `done` or `failed`,
    /// unless `cancel` fires first, in which case nothing more is emitted.
    /// A fetch already in flight when `cancel` fires runs to completion.
    pub async fn crawl<E>(
        &self,
        root: &str,
        max_depth: usize,
        cancel: &CancellationToken,
        mut emit: E,
    ) -> CrawlOutcome
    where
        E: FnMut(CrawlEvent),
    {
        let root = canonical_root(root);
        tracing::info!(%root, max_depth, "Starting sitemap crawl");
        let mut state = CrawlState::new(root, max_depth);
        let batch_size = self.config.batch_size.max(1);

        while let Some((url, depth)) = state.queue.pop_front() {
            if cancel.is_cancelled() {
                break;
            }
            if !state.visited.insert(url.clone()) {
                continue;
            }

            let doc = match self.fetch_document(&url).await {
                Ok(doc) => doc,
                Err(e) => {
                    let error = e.to_string();
                    tracing::warn!(%url, depth, %error, "Sitemap crawl failed");
                    emit(CrawlEvent::Failed {
                        error: error.clone(),
                    });
                    return CrawlOutcome::Failed { error };
                }
            };
            tracing::debug!(
                %url,
                depth,
                sitemaps = doc.sitemaps.len(),
                pages = doc.pages.len(),
                "Parsed sitemap"
            );

            state.enqueue_children(doc.sitemaps, depth);
            let fresh = state.fresh_pages(doc.pages);
            for chunk in fresh.chunks(batch_size) {
                state.total += chunk.len();
                emit(CrawlEvent::Batch {
                    urls: chunk.to_vec(),
                    total: state.total,
                });
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(total = state.total, "Sitemap crawl cancelled");
            return CrawlOutcome::Cancelled { total: state.total };
        }

        tracing::info!(total = state.total, sitemaps = state.visited.len(), "Sitemap crawl done");
        emit(CrawlEvent::Done { total: state.total });
        CrawlOutcome::Completed { total: state.total }
    }

    /// Crawl to completion and return every discovered URL in discovery order.
    pub async fn discover(&self, root: &str, max_depth: usize) -> Result<Vec<String>, AppError> {
        let mut urls = Vec::new();
        let outcome = self
            .crawl(root, max_depth, &CancellationToken::new(), |event| {
                if let CrawlEvent::Batch { urls: batch, .. } = event {
                    urls.extend(batch);
                }
            })
            .await;

        match outcome {
            CrawlOutcome::Completed { .. } | CrawlOutcome::Cancelled { .. } => Ok(urls),
            CrawlOutcome::Failed { error } => Err(AppError::SitemapError(error)),
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<SitemapDocument, AppError> {
        let timeout = self.config.fetch_timeout;
        let response = match tokio::time::timeout(timeout, self.fetcher.fetch(url, timeout)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(AppError::SitemapError(format!("failed to fetch {url}: {e}")));
            }
            Err(_) => {
                return Err(AppError::SitemapError(format!(
                    "failed to fetch {url}: timed out after {} ms",
                    timeout.as_millis()
                )));
            }
        };

        if !response.is_success() {
            return Err(AppError::SitemapError(format!(
                "HTTP {} for {url}",
                response.status
            )));
        }

        self.parser.parse(&response.body, url)
    }
}
