//! Owns live jobs, starts their worker pools and evicts them after a TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::Job;
use crate::models::CheckResult;
use crate::pool::{ResultSink, WorkerPool};
use crate::traits::{Fetcher, PageAnalyzer};
use crate::util::clean_url_list;

/// Configuration for the job registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a finished job stays available for lookup and replay.
    pub job_ttl: Duration,
    /// Concurrency used when a submission does not ask for one.
    pub default_concurrency: usize,
    /// Upper bound on requested concurrency.
    pub max_concurrency: usize,
    /// Per-URL request timeout.
    pub request_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            job_ttl: Duration::from_secs(10 * 60),
            default_concurrency: 5,
            max_concurrency: 50,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl RegistryConfig {
    pub fn with_job_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl = ttl;
        self
    }

    pub fn with_default_concurrency(mut self, concurrency: usize) -> Self {
        self.default_concurrency = concurrency;
        self
    }

    pub fn with_max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = concurrency;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Clamp a requested concurrency into `1..=max_concurrency`.
    pub fn resolve_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_concurrency)
            .clamp(1, self.max_concurrency.max(1))
    }
}

/// Job activity emitted by the registry for monitoring/logging.
#[derive(Debug, Clone)]
pub enum JobActivity<'a> {
    Created {
        job_id: Uuid,
        total: usize,
        concurrency: usize,
    },
    UrlChecked {
        job_id: Uuid,
        index: usize,
        result: &'a CheckResult,
    },
    ResultDiscarded {
        job_id: Uuid,
        index: usize,
    },
    Finished {
        job_id: Uuid,
        processed: usize,
        total: usize,
    },
    Failed {
        job_id: Uuid,
        error: &'a str,
    },
    Cancelled {
        job_id: Uuid,
        processed: usize,
        total: usize,
    },
    Evicted {
        job_id: Uuid,
    },
}

/// Trait for receiving job activity (decoupled logging).
pub trait JobReporter: Send + Sync + 'static {
    fn report(&self, activity: JobActivity<'_>) {
        let _ = activity;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobReporter;

impl JobReporter for TracingJobReporter {
    fn report(&self, activity: JobActivity<'_>) {
        match activity {
            JobActivity::Created {
                job_id,
                total,
                concurrency,
            } => {
                tracing::info!(%job_id, total, concurrency, "Job created");
            }
            JobActivity::UrlChecked {
                job_id,
                index,
                result,
            } => {
                tracing::debug!(
                    %job_id,
                    index,
                    url = %result.url,
                    status = ?result.status,
                    error = ?result.error,
                    ms = result.response_time_ms,
                    "URL checked"
                );
            }
            JobActivity::ResultDiscarded { job_id, index } => {
                tracing::debug!(%job_id, index, "Result discarded");
            }
            JobActivity::Finished {
                job_id,
                processed,
                total,
            } => {
                tracing::info!(%job_id, processed, total, "Job finished");
            }
            JobActivity::Failed { job_id, error } => {
                tracing::warn!(%job_id, %error, "Job failed");
            }
            JobActivity::Cancelled {
                job_id,
                processed,
                total,
            } => {
                tracing::info!(%job_id, processed, total, "Job cancelled");
            }
            JobActivity::Evicted { job_id } => {
                tracing::debug!(%job_id, "Job evicted");
            }
        }
    }
}

struct Entry {
    job: Arc<Job>,
    eviction: Option<JoinHandle<()>>,
}

struct RegistryInner<F, A, R>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    pool: WorkerPool<F, A>,
    config: RegistryConfig,
    reporter: R,
    jobs: Mutex<HashMap<Uuid, Entry>>,
}

impl<F, A, R> RegistryInner<F, A, R>
where
    F: Fetcher,
    A: PageAnalyzer,
    R: JobReporter,
{
    fn jobs(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict(&self, id: Uuid) {
        if self.jobs().remove(&id).is_some() {
            self.reporter.report(JobActivity::Evicted { job_id: id });
        }
    }
}

/// Registry of live jobs. Cheap to clone; clones share the same jobs.
pub struct JobRegistry<F, A, R = TracingJobReporter>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    inner: Arc<RegistryInner<F, A, R>>,
}

impl<F, A, R> Clone for JobRegistry<F, A, R>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, A> JobRegistry<F, A, TracingJobReporter>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    pub fn new(fetcher: F, analyzer: A, config: RegistryConfig) -> Self {
        Self::with_reporter(fetcher, analyzer, config, TracingJobReporter)
    }
}

impl<F, A, R> JobRegistry<F, A, R>
where
    F: Fetcher,
    A: PageAnalyzer,
    R: JobReporter,
{
    pub fn with_reporter(fetcher: F, analyzer: A, config: RegistryConfig, reporter: R) -> Self {
        let pool = WorkerPool::new(fetcher, analyzer, config.request_timeout);
        Self {
            inner: Arc::new(RegistryInner {
                pool,
                config,
                reporter,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Validate `urls`, register a new job and start checking it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(
        &self,
        urls: Vec<String>,
        concurrency: Option<usize>,
    ) -> Result<Arc<Job>, AppError> {
        let urls = clean_url_list(urls)?;
        let concurrency = self.inner.config.resolve_concurrency(concurrency);
        let job = Arc::new(Job::new(urls, concurrency));

        self.inner.jobs().insert(
            job.id(),
            Entry {
                job: Arc::clone(&job),
                eviction: None,
            },
        );
        self.inner.reporter.report(JobActivity::Created {
            job_id: job.id(),
            total: job.total(),
            concurrency,
        });

        let registry = self.clone();
        let running = Arc::clone(&job);
        tokio::spawn(async move { registry.run_job(running).await });

        Ok(job)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Job>> {
        self.inner.jobs().get(&id).map(|entry| Arc::clone(&entry.job))
    }

    /// Look up a job by its string id. Malformed ids are simply not found.
    pub fn lookup(&self, id: &str) -> Result<Arc<Job>, AppError> {
        Uuid::parse_str(id)
            .ok()
            .and_then(|uuid| self.get(uuid))
            .ok_or_else(|| AppError::JobNotFound(id.to_string()))
    }

    /// Cancel a live job. Returns `false` for unknown or already-finished jobs.
    pub fn cancel(&self, id: Uuid) -> bool {
        let Some(job) = self.get(id) else {
            return false;
        };
        if !job.cancel() {
            return false;
        }

        self.inner.reporter.report(JobActivity::Cancelled {
            job_id: id,
            processed: job.processed(),
            total: job.total(),
        });
        self.schedule_eviction(id);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arm (or re-arm) the eviction timer for `id`.
    pub fn schedule_eviction(&self, id: Uuid) {
        let inner: Weak<RegistryInner<F, A, R>> = Arc::downgrade(&self.inner);
        let ttl = self.inner.config.job_ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = inner.upgrade() {
                inner.evict(id);
            }
        });

        let mut jobs = self.inner.jobs();
        match jobs.get_mut(&id) {
            Some(entry) => {
                if let Some(previous) = entry.eviction.replace(timer) {
                    previous.abort();
                }
            }
            None => timer.abort(),
        }
    }

    async fn run_job(&self, job: Arc<Job>) {
        job.mark_running();
        let sink = Arc::new(JobSink {
            job: Arc::clone(&job),
            inner: Arc::clone(&self.inner),
        });

        let outcome = self
            .inner
            .pool
            .run(job.urls(), job.concurrency(), sink)
            .await;

        let ended = match outcome {
            Ok(()) => {
                let ended = job.complete();
                if ended {
                    self.inner.reporter.report(JobActivity::Finished {
                        job_id: job.id(),
                        processed: job.processed(),
                        total: job.total(),
                    });
                }
                ended
            }
            Err(e) => {
                let error = e.to_string();
                let ended = job.fail(error.as_str());
                if ended {
                    self.inner.reporter.report(JobActivity::Failed {
                        job_id: job.id(),
                        error: &error,
                    });
                }
                ended
            }
        };

        if ended {
            self.schedule_eviction(job.id());
        }
    }
}

/// Feeds pool results into a job and reports them.
struct JobSink<F, A, R>
where
    F: Fetcher,
    A: PageAnalyzer,
{
    job: Arc<Job>,
    inner: Arc<RegistryInner<F, A, R>>,
}

impl<F, A, R> ResultSink for JobSink<F, A, R>
where
    F: Fetcher,
    A: PageAnalyzer,
    R: JobReporter,
{
    fn should_stop(&self) -> bool {
        self.job.should_stop()
    }

    fn deliver(&self, index: usize, result: CheckResult) {
        let job_id = self.job.id();
        self.inner.reporter.report(JobActivity::UrlChecked {
            job_id,
            index,
            result: &result,
        });
        if !self.job.record(index, result) {
            self.inner
                .reporter
                .report(JobActivity::ResultDiscarded { job_id, index });
        }
    }
}
