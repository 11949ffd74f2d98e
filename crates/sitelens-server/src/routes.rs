use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use sitelens_core::error::AppError;
use sitelens_core::events::{ChannelObserver, JobEvent};
use sitelens_core::util::normalize_url;

use crate::dto::{
    CancelJobRequest, CancelJobResponse, CreateJobRequest, CreateJobResponse, HealthResponse,
    JobSnapshotResponse, SitemapQuery,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::sse;
use crate::state::AppState;

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/jobs", post(create_job))
        .route("/api/jobs/cancel", post(cancel_job))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/events", get(job_events))
        .route("/api/sitemap/stream", get(sitemap_stream));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 200, description = "Job created and started", body = CreateJobResponse),
        (status = 400, description = "Missing or empty URL list", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let urls = body
        .urls
        .ok_or_else(|| AppError::ValidationError("urls is required".to_string()))?;

    let job = state.registry.create(urls, body.concurrency)?;

    let response = CreateJobResponse {
        job_id: job.id(),
        total: job.total(),
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}/events",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Event stream: start, progress..., then done or failed", body = String, content_type = "text/event-stream"),
        (status = 404, description = "Unknown or evicted job", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn job_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.registry.lookup(&id)?;

    let (observer, rx) = ChannelObserver::<JobEvent>::channel();
    let live = job.subscribe(Box::new(observer));
    tracing::debug!(job_id = %job.id(), live, "Observer attached");

    Ok(sse::event_stream(rx, state.config.keepalive))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Current job state and results", body = JobSnapshotResponse),
        (status = 404, description = "Unknown or evicted job", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.registry.lookup(&id)?;
    Ok(axum::Json(JobSnapshotResponse::from(job.snapshot())))
}

#[utoipa::path(
    post,
    path = "/api/jobs/cancel",
    request_body = CancelJobRequest,
    responses(
        (status = 200, description = "Whether a running job was cancelled", body = CancelJobResponse),
    ),
    tag = "jobs"
)]
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CancelJobRequest>,
) -> impl IntoResponse {
    let ok = body
        .job_id
        .and_then(|id| Uuid::parse_str(id.trim()).ok())
        .is_some_and(|id| state.registry.cancel(id));

    axum::Json(CancelJobResponse { ok })
}

// ---------------------------------------------------------------------------
// Sitemaps
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/sitemap/stream",
    params(SitemapQuery),
    responses(
        (status = 200, description = "Event stream: batch..., then done or failed", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing url", body = crate::dto::ErrorResponse),
    ),
    tag = "sitemaps"
)]
pub async fn sitemap_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SitemapQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let root = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::ValidationError("url is required".to_string()))?;

    let root = normalize_url(root);
    let max_depth = state.crawler.config().resolve_depth(query.max_depth);
    let rx = sse::spawn_crawl(state.crawler.clone(), root, max_depth);

    Ok(sse::event_stream(rx, state.config.keepalive))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        active_jobs: state.registry.len(),
    };

    (StatusCode::OK, axum::Json(response))
}
