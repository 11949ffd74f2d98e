use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json as body;
use wiremock::MockServer;

use crate::common::{get, json, mount_html, post_json, setup_test_app};

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app();

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json = json(&body);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["activeJobs"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app();

    let (status, body) = get(&app, "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    let json = json(&body);
    assert!(json["paths"]["/api/jobs"].is_object());
    assert!(json["paths"]["/api/sitemap/stream"].is_object());
}

#[tokio::test]
async fn create_job_without_urls_returns_400() {
    let app = setup_test_app();

    let (status, response) = post_json(&app, "/api/jobs", body!({ "concurrency": 2 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&response)["error"], "validation_error");
}

#[tokio::test]
async fn create_job_with_blank_urls_returns_400() {
    let app = setup_test_app();

    let (status, _) = post_json(&app, "/api/jobs", body!({ "urls": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&app, "/api/jobs", body!({ "urls": ["  ", ""] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, health) = get(&app, "/health").await;
    assert_eq!(json(&health)["activeJobs"], 0);
}

#[tokio::test]
async fn create_job_returns_id_and_trimmed_total() {
    let server = MockServer::start().await;
    mount_html(&server, "/a", "<html><h1>A</h1></html>", Duration::ZERO).await;
    let app = setup_test_app();

    let urls = [format!("{}/a", server.uri()), " ".to_string()];
    let (status, response) = post_json(&app, "/api/jobs", body!({ "urls": urls })).await;

    assert_eq!(status, StatusCode::OK);
    let json = json(&response);
    assert_eq!(json["total"], 1);
    assert!(json["jobId"].as_str().is_some());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = setup_test_app();

    let (status, response) = get(&app, "/api/jobs/6b0a6e4e-8d7e-4c4b-9a57-000000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&response)["error"], "not_found");

    let (status, _) = get(&app, "/api/jobs/not-a-uuid/events").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_unknown_job_is_not_an_error() {
    let app = setup_test_app();

    let (status, response) = post_json(
        &app,
        "/api/jobs/cancel",
        body!({ "jobId": "6b0a6e4e-8d7e-4c4b-9a57-000000000000" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["ok"], false);

    let (status, response) = post_json(&app, "/api/jobs/cancel", body!({ "jobId": "garbage" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["ok"], false);
}

#[tokio::test]
async fn cancel_without_job_id_is_not_an_error() {
    let app = setup_test_app();

    let (status, response) = post_json(&app, "/api/jobs/cancel", body!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["ok"], false);
}

#[tokio::test]
async fn snapshot_reports_positional_results() {
    let server = MockServer::start().await;
    mount_html(&server, "/one", "<html><title>One</title><h1>First</h1></html>", Duration::ZERO).await;
    mount_html(&server, "/two", "<html><h1>A</h1><h1>B</h1></html>", Duration::ZERO).await;
    let app = setup_test_app();

    let urls = [format!("{}/one", server.uri()), format!("{}/two", server.uri())];
    let (_, created) = post_json(&app, "/api/jobs", body!({ "urls": urls })).await;
    let job_id = json(&created)["jobId"].as_str().unwrap().to_string();

    // Draining the event stream waits for the job to finish.
    get(&app, &format!("/api/jobs/{job_id}/events")).await;

    let (status, response) = get(&app, &format!("/api/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = json(&response);
    assert_eq!(snapshot["status"], "done");
    assert_eq!(snapshot["processed"], 2);
    assert_eq!(snapshot["total"], 2);
    assert!(snapshot["finishedAt"].is_string());

    let results = snapshot["results"].as_array().unwrap();
    assert_eq!(results[0]["url"], urls[0]);
    assert_eq!(results[0]["title"], "One");
    assert_eq!(results[0]["h1Count"], 1);
    assert_eq!(results[1]["url"], urls[1]);
    assert_eq!(results[1]["multipleH1"], true);
}
