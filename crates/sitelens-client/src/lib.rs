pub mod analyzer;
pub mod fetcher;
pub mod sitemap;

pub use analyzer::HtmlPageAnalyzer;
pub use fetcher::ReqwestFetcher;
pub use sitemap::XmlSitemapParser;
