use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "sitelens API",
        version = "0.1.0",
        description = "Streaming page-structure checks and sitemap discovery."
    ),
    paths(
        crate::routes::create_job,
        crate::routes::job_events,
        crate::routes::get_job,
        crate::routes::cancel_job,
        crate::routes::sitemap_stream,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CreateJobRequest,
        crate::dto::CreateJobResponse,
        crate::dto::CancelJobRequest,
        crate::dto::CancelJobResponse,
        crate::dto::JobSnapshotResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "jobs", description = "URL check jobs and their event streams"),
        (name = "sitemaps", description = "Sitemap discovery"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
