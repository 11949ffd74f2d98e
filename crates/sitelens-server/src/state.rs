use sitelens_client::{HtmlPageAnalyzer, ReqwestFetcher, XmlSitemapParser};
use sitelens_core::error::AppError;
use sitelens_core::{JobRegistry, SitemapCrawler};

use crate::config::ServerConfig;

pub type Registry = JobRegistry<ReqwestFetcher, HtmlPageAnalyzer>;
pub type Crawler = SitemapCrawler<ReqwestFetcher, XmlSitemapParser>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub registry: Registry,
    pub crawler: Crawler,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, AppError> {
        let fetcher = ReqwestFetcher::new()?;
        let registry = JobRegistry::new(
            fetcher.clone(),
            HtmlPageAnalyzer::new()?,
            config.registry.clone(),
        );
        let crawler = SitemapCrawler::new(fetcher, XmlSitemapParser::new(), config.crawl.clone());

        Ok(Self {
            registry,
            crawler,
            config,
        })
    }
}
