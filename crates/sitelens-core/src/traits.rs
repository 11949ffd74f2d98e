use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::PageSignals;

/// A single HTTP response as seen by the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the content type announces an HTML document.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

/// Performs one network request bounded by a timeout.
///
/// Non-2xx responses are returned as `Ok`; only transport failures are errors
/// (`Timeout`, `NetworkError`, `HttpError`).
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchResponse, AppError>> + Send;
}

/// Extracts page-structure signals from raw HTML.
pub trait PageAnalyzer: Send + Sync + Clone + 'static {
    /// Returns `AppError::NotHtml` when the markup cannot be analyzed as a page.
    fn analyze(&self, html: &str, url: &str) -> Result<PageSignals, AppError>;
}

/// Nested sitemap references and leaf page URLs found in one sitemap document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    pub sitemaps: Vec<String>,
    pub pages: Vec<String>,
}

/// Parses sitemap / sitemap-index XML.
pub trait SitemapParser: Send + Sync + Clone + 'static {
    /// `base_url` is the document's own URL, used to resolve relative `<loc>` entries.
    fn parse(&self, xml: &str, base_url: &str) -> Result<SitemapDocument, AppError>;
}
