use std::str::FromStr;
use std::time::Duration;

use sitelens_core::error::AppError;
use sitelens_core::{CrawlConfig, RegistryConfig};

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub registry: RegistryConfig,
    pub crawl: CrawlConfig,
    /// Interval between `ping` events on idle streams.
    pub keepalive: Duration,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            registry: RegistryConfig::default(),
            crawl: CrawlConfig::default(),
            keepalive: Duration::from_secs(15),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `SITELENS_PORT` (default 3000)
    /// - `SITELENS_JOB_TTL_SECS` (default 600)
    /// - `SITELENS_DEFAULT_CONCURRENCY` (default 5)
    /// - `SITELENS_MAX_CONCURRENCY` (default 50)
    /// - `SITELENS_REQUEST_TIMEOUT_MS` (default 15000)
    /// - `SITELENS_SITEMAP_MAX_DEPTH` (default 3)
    /// - `SITELENS_SITEMAP_BATCH_SIZE` (default 200)
    /// - `SITELENS_SITEMAP_FETCH_TIMEOUT_SECS` (default 20)
    /// - `SITELENS_KEEPALIVE_SECS` (default 15)
    /// - `SITELENS_MAX_BODY_BYTES` (default 10 MiB)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let vars = Vars { lookup };

        let registry = defaults
            .registry
            .clone()
            .with_job_ttl(vars.duration_secs("SITELENS_JOB_TTL_SECS", defaults.registry.job_ttl)?)
            .with_default_concurrency(
                vars.positive("SITELENS_DEFAULT_CONCURRENCY", defaults.registry.default_concurrency)?,
            )
            .with_max_concurrency(
                vars.positive("SITELENS_MAX_CONCURRENCY", defaults.registry.max_concurrency)?,
            )
            .with_request_timeout(Duration::from_millis(vars.positive(
                "SITELENS_REQUEST_TIMEOUT_MS",
                defaults.registry.request_timeout.as_millis() as u64,
            )?));

        let crawl = defaults
            .crawl
            .clone()
            .with_max_depth(vars.parse("SITELENS_SITEMAP_MAX_DEPTH", defaults.crawl.max_depth)?)
            .with_batch_size(vars.positive("SITELENS_SITEMAP_BATCH_SIZE", defaults.crawl.batch_size)?)
            .with_fetch_timeout(vars.duration_secs(
                "SITELENS_SITEMAP_FETCH_TIMEOUT_SECS",
                defaults.crawl.fetch_timeout,
            )?);

        Ok(Self {
            port: vars.parse("SITELENS_PORT", defaults.port)?,
            registry,
            crawl,
            keepalive: vars.duration_secs("SITELENS_KEEPALIVE_SECS", defaults.keepalive)?,
            max_body_bytes: vars.positive("SITELENS_MAX_BODY_BYTES", defaults.max_body_bytes)?,
        })
    }
}

struct Vars<L> {
    lookup: L,
}

impl<L: Fn(&str) -> Option<String>> Vars<L> {
    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, AppError> {
        match (self.lookup)(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid {name} '{raw}': expected a number"))
            }),
        }
    }

    fn positive<T: FromStr + PartialEq + Default>(&self, name: &str, default: T) -> Result<T, AppError> {
        let value = self.parse(name, default)?;
        if value == T::default() {
            return Err(AppError::ConfigError(format!("{name} must be at least 1")));
        }
        Ok(value)
    }

    fn duration_secs(&self, name: &str, default: Duration) -> Result<Duration, AppError> {
        self.positive(name, default.as_secs()).map(Duration::from_secs)
    }
}
