use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sitelens_core::job::JobSnapshot;
use sitelens_core::models::CheckResult;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateJobRequest {
    /// URLs to check, in report order. Blank entries are ignored.
    pub urls: Option<Vec<String>>,
    /// Worker count (defaults to server configuration, clamped to its maximum)
    pub concurrency: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub total: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobRequest {
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CancelJobResponse {
    /// `false` when the job is unknown or already finished.
    pub ok: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshotResponse {
    pub job_id: Uuid,
    pub status: String,
    pub processed: usize,
    pub total: usize,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// One slot per submitted URL; `null` until that URL has been checked.
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<Option<CheckResult>>,
}

impl From<JobSnapshot> for JobSnapshotResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            job_id: snapshot.job_id,
            status: snapshot.status.to_string(),
            processed: snapshot.processed,
            total: snapshot.total,
            error: snapshot.error,
            created_at: snapshot.created_at,
            finished_at: snapshot.finished_at,
            results: snapshot.results,
        }
    }
}

// ---------------------------------------------------------------------------
// Sitemaps
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SitemapQuery {
    /// Root sitemap or sitemap index URL
    pub url: Option<String>,
    /// Maximum nesting depth below the root (clamped to the server limit)
    pub max_depth: Option<usize>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_jobs: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
