use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::events::{EventBus, JobEvent, Observer};
use crate::models::CheckResult;

/// Lifecycle state of a job. Evicted jobs are simply gone from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of a job's state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Positional: slot `i` belongs to input URL `i`.
    pub results: Vec<Option<CheckResult>>,
}

struct JobState {
    status: JobStatus,
    results: Vec<Option<CheckResult>>,
    processed: usize,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
    bus: EventBus<JobEvent>,
}

/// One batch run over a URL list.
///
/// Results, the processed counter, the event log and the observer set all live
/// behind a single mutex so every mutation and its broadcast happen in one
/// critical section.
pub struct Job {
    id: Uuid,
    urls: Arc<[String]>,
    concurrency: usize,
    created_at: DateTime<Utc>,
    cancelled: AtomicBool,
    state: Mutex<JobState>,
}

impl Job {
    /// Create a job and emit its `start` event.
    pub fn new(urls: Vec<String>, concurrency: usize) -> Self {
        let total = urls.len();
        let mut bus = EventBus::new();
        bus.emit(JobEvent::Start { total });

        Self {
            id: Uuid::new_v4(),
            urls: urls.into(),
            concurrency,
            created_at: Utc::now(),
            cancelled: AtomicBool::new(false),
            state: Mutex::new(JobState {
                status: JobStatus::Created,
                results: vec![None; total],
                processed: 0,
                error: None,
                finished_at: None,
                bus,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn urls(&self) -> Arc<[String]> {
        Arc::clone(&self.urls)
    }

    pub fn total(&self) -> usize {
        self.urls.len()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    pub fn processed(&self) -> usize {
        self.state().processed
    }

    /// True once cancelled or terminal: workers must not start or deliver work.
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.status().is_terminal()
    }

    pub(crate) fn mark_running(&self) {
        let mut state = self.state();
        if state.status == JobStatus::Created {
            state.status = JobStatus::Running;
        }
    }

    /// Store the result for `index` and emit `progress`.
    ///
    /// Discarded (returns `false`) when the job was cancelled or already ended,
    /// or when the slot was written before.
    pub fn record(&self, index: usize, result: CheckResult) -> bool {
        let mut state = self.state();
        if self.is_cancelled() || state.status.is_terminal() {
            return false;
        }
        match state.results.get(index) {
            Some(None) => {}
            _ => return false,
        }

        state.results[index] = Some(result.clone());
        state.processed += 1;
        let processed = state.processed;
        state.bus.emit(JobEvent::Progress {
            index,
            result,
            processed,
            total: self.total(),
        });
        true
    }

    /// Transition to `Done`. No-op if the job already ended.
    pub fn complete(&self) -> bool {
        let mut state = self.state();
        if state.status.is_terminal() {
            return false;
        }
        state.status = JobStatus::Done;
        state.finished_at = Some(Utc::now());
        let processed = state.processed;
        state.bus.emit(JobEvent::Done {
            processed,
            total: self.total(),
        })
    }

    /// Transition to `Failed`. No-op if the job already ended.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        let mut state = self.state();
        if state.status.is_terminal() {
            return false;
        }
        let error = error.into();
        state.status = JobStatus::Failed;
        state.finished_at = Some(Utc::now());
        state.error = Some(error.clone());
        state.bus.emit(JobEvent::Failed { error })
    }

    /// Set the cancellation flag and, if the job is still live, fail it with
    /// `"cancelled"`. In-flight checks keep running; their results are dropped.
    pub fn cancel(&self) -> bool {
        self.cancelled.store(true, Ordering::SeqCst);
        self.fail(AppError::Cancelled.to_string())
    }

    /// Replay the event log to `observer` and attach it for live events.
    pub fn subscribe(&self, observer: Box<dyn Observer<JobEvent>>) -> bool {
        self.state().bus.attach(observer)
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.state().bus.history().to_vec()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.state();
        JobSnapshot {
            job_id: self.id,
            status: state.status,
            processed: state.processed,
            total: self.total(),
            error: state.error.clone(),
            created_at: self.created_at,
            finished_at: state.finished_at,
            results: state.results.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("total", &self.total())
            .field("concurrency", &self.concurrency)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelObserver;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://example.com/{i}")).collect()
    }

    fn result_for(i: usize) -> CheckResult {
        CheckResult::fetched(format!("https://example.com/{i}"), 200, 1)
    }

    #[test]
    fn test_new_job_emits_start() {
        let job = Job::new(urls(3), 2);
        assert_eq!(job.status(), JobStatus::Created);
        assert_eq!(job.events(), vec![JobEvent::Start { total: 3 }]);
        assert_eq!(job.snapshot().results.len(), 3);
    }

    #[test]
    fn test_record_is_positional_and_counts() {
        let job = Job::new(urls(3), 2);
        assert!(job.record(2, result_for(2)));
        assert!(job.record(0, result_for(0)));

        let snapshot = job.snapshot();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.results[2].as_ref().unwrap().url, "https://example.com/2");
        assert!(snapshot.results[1].is_none());

        match &job.events()[2] {
            JobEvent::Progress {
                index, processed, ..
            } => {
                assert_eq!(*index, 0);
                assert_eq!(*processed, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_slot_written_at_most_once() {
        let job = Job::new(urls(2), 1);
        assert!(job.record(1, result_for(1)));
        assert!(!job.record(1, result_for(0)));
        assert!(!job.record(7, result_for(7)));
        assert_eq!(job.processed(), 1);
    }

    #[test]
    fn test_single_terminal_transition() {
        let job = Job::new(urls(1), 1);
        job.record(0, result_for(0));
        assert!(job.complete());
        assert!(!job.fail("late fault"));
        assert!(!job.cancel());

        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(
            job.events().last(),
            Some(&JobEvent::Done {
                processed: 1,
                total: 1
            })
        );
        assert!(job.snapshot().finished_at.is_some());
    }

    #[test]
    fn test_cancel_discards_later_results() {
        let job = Job::new(urls(3), 3);
        job.record(0, result_for(0));
        assert!(job.cancel());
        assert!(job.should_stop());
        assert!(!job.record(1, result_for(1)));

        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("cancelled"));
        assert_eq!(snapshot.processed, 1);
        assert_eq!(
            job.events().last(),
            Some(&JobEvent::Failed {
                error: "cancelled".into()
            })
        );
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_same_sequence() {
        let job = Job::new(urls(2), 1);
        let (early, mut early_rx) = ChannelObserver::<JobEvent>::channel();
        job.subscribe(Box::new(early));

        job.record(1, result_for(1));

        let (late, mut late_rx) = ChannelObserver::<JobEvent>::channel();
        assert!(job.subscribe(Box::new(late)));

        job.record(0, result_for(0));
        job.complete();

        let mut early_events = Vec::new();
        while let Some(event) = early_rx.recv().await {
            early_events.push(event);
        }
        let mut late_events = Vec::new();
        while let Some(event) = late_rx.recv().await {
            late_events.push(event);
        }

        assert_eq!(early_events.len(), 4);
        assert_eq!(early_events, late_events);
        assert_eq!(early_events, job.events());
    }
}
