mod report;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sitelens_client::{HtmlPageAnalyzer, ReqwestFetcher, XmlSitemapParser};
use sitelens_core::events::{ChannelObserver, CrawlEvent, JobEvent};
use sitelens_core::{CrawlConfig, CrawlOutcome, JobRegistry, JobStatus, RegistryConfig, SitemapCrawler};

use crate::report::{ReportFormat, write_report};

#[derive(Parser)]
#[command(name = "sitelens", version, about = "Check pages for headings, titles and metadata")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover page URLs from a sitemap or sitemap index
    Crawl {
        /// Root sitemap URL
        #[arg(short, long)]
        sitemap: String,

        /// Maximum nesting depth below the root sitemap
        #[arg(long, env = "SITELENS_SITEMAP_MAX_DEPTH")]
        max_depth: Option<usize>,
    },

    /// Check a list of URLs and write a report
    Check {
        /// URLs to check
        urls: Vec<String>,

        /// File with one URL per line (`#` starts a comment)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Also check every page listed in this sitemap
        #[arg(short, long)]
        sitemap: Option<String>,

        /// Maximum nesting depth when expanding --sitemap
        #[arg(long, env = "SITELENS_SITEMAP_MAX_DEPTH")]
        max_depth: Option<usize>,

        /// Number of concurrent workers
        #[arg(short, long, env = "SITELENS_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Per-URL request timeout in milliseconds
        #[arg(long, env = "SITELENS_REQUEST_TIMEOUT_MS", default_value_t = 15_000)]
        timeout_ms: u64,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so reports on stdout stay machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sitelens=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl { sitemap, max_depth } => cmd_crawl(&sitemap, max_depth).await?,
        Commands::Check {
            urls,
            file,
            sitemap,
            max_depth,
            concurrency,
            timeout_ms,
            format,
            output,
        } => {
            let mut urls = urls;
            if let Some(path) = &file {
                urls.extend(read_url_file(path)?);
            }
            if let Some(root) = &sitemap {
                urls.extend(discover(root, max_depth).await?);
            }
            cmd_check(
                urls,
                concurrency,
                Duration::from_millis(timeout_ms),
                format,
                output.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}

fn crawler() -> Result<SitemapCrawler<ReqwestFetcher, XmlSitemapParser>> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    Ok(SitemapCrawler::new(fetcher, XmlSitemapParser::new(), CrawlConfig::default()))
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            token.cancel();
        }
    });
}

/// Read one URL per line, skipping blank lines and `#` comments.
fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

async fn discover(root: &str, max_depth: Option<usize>) -> Result<Vec<String>> {
    let crawler = crawler()?;
    let depth = crawler.config().resolve_depth(max_depth);

    tracing::info!(%root, depth, "Expanding sitemap");
    let urls = crawler.discover(root, depth).await?;
    tracing::info!(total = urls.len(), "Sitemap expanded");

    Ok(urls)
}

async fn cmd_crawl(root: &str, max_depth: Option<usize>) -> Result<()> {
    let crawler = crawler()?;
    let depth = crawler.config().resolve_depth(max_depth);
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;

    let outcome = crawler
        .crawl(root, depth, &cancel, |event| {
            if let CrawlEvent::Batch { urls, total } = event {
                tracing::debug!(batch = urls.len(), total, "Discovered URLs");
                for url in urls {
                    if let Err(e) = writeln!(out, "{url}")
                        && write_error.is_none()
                    {
                        write_error = Some(e);
                    }
                }
            }
        })
        .await;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write URLs to stdout");
    }

    match outcome {
        CrawlOutcome::Completed { total } => {
            tracing::info!(total, "Crawl complete");
            Ok(())
        }
        CrawlOutcome::Cancelled { total } => {
            tracing::warn!(total, "Crawl cancelled");
            Ok(())
        }
        CrawlOutcome::Failed { error } => anyhow::bail!("Crawl failed: {error}"),
    }
}

async fn cmd_check(
    urls: Vec<String>,
    concurrency: Option<usize>,
    timeout: Duration,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let analyzer = HtmlPageAnalyzer::new()?;
    let config = RegistryConfig::default().with_request_timeout(timeout);
    let registry = JobRegistry::new(fetcher, analyzer, config);

    let job = registry.create(urls, concurrency)?;
    let (observer, mut rx) = ChannelObserver::<JobEvent>::channel();
    job.subscribe(Box::new(observer));

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut interrupted = false;
    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = cancel.cancelled(), if !interrupted => {
                interrupted = true;
                registry.cancel(job.id());
                continue;
            }
        };
        let Some(event) = event else { break };

        match event {
            JobEvent::Start { total } => {
                tracing::info!(job_id = %job.id(), total, concurrency = job.concurrency(), "Checking URLs");
            }
            JobEvent::Progress {
                result,
                processed,
                total,
                ..
            } => match &result.error {
                Some(error) => tracing::warn!(url = %result.url, processed, total, %error, "Check failed"),
                None => tracing::info!(
                    url = %result.url,
                    status = result.status,
                    h1_count = result.h1_count,
                    processed,
                    total,
                    "Checked"
                ),
            },
            JobEvent::Done { processed, total } => {
                tracing::info!(processed, total, "All URLs checked");
            }
            JobEvent::Failed { error } => {
                tracing::warn!(%error, processed = job.processed(), "Job stopped");
            }
        }
    }

    let snapshot = job.snapshot();
    let skipped = snapshot.results.iter().filter(|r| r.is_none()).count();
    if skipped > 0 {
        tracing::warn!(skipped, "Some URLs were not checked and are left out of the report");
    }
    let results: Vec<_> = snapshot.results.into_iter().flatten().collect();

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create report file: {}", path.display()))?;
            write_report(std::io::BufWriter::new(file), format, &results)?;
            tracing::info!(path = %path.display(), rows = results.len(), "Report written");
        }
        None => write_report(std::io::stdout().lock(), format, &results)?,
    }

    if snapshot.status == JobStatus::Failed {
        anyhow::bail!(
            "Job did not complete: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    Ok(())
}
