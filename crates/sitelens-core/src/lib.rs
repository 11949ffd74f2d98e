pub mod crawler;
pub mod error;
pub mod events;
pub mod job;
pub mod models;
pub mod pool;
pub mod registry;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use crawler::{CrawlConfig, CrawlOutcome, SitemapCrawler};
pub use error::AppError;
pub use events::{ChannelObserver, CrawlEvent, EventBus, JobEvent, Observer, StreamEvent};
pub use job::{Job, JobSnapshot, JobStatus};
pub use models::{CheckResult, PageSignals};
pub use pool::{ResultSink, WorkerPool, check_url};
pub use registry::{JobActivity, JobRegistry, JobReporter, RegistryConfig, TracingJobReporter};
pub use traits::{FetchResponse, Fetcher, PageAnalyzer, SitemapDocument, SitemapParser};
