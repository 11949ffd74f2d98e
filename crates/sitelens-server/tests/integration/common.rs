use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitelens_server::config::ServerConfig;
use sitelens_server::routes;
use sitelens_server::state::AppState;

/// Build the app router with real collaborators and a long keep-alive so
/// streams in tests carry no `ping` frames.
pub fn setup_test_app() -> Router {
    setup_test_app_with_keepalive(Duration::from_secs(300))
}

pub fn setup_test_app_with_keepalive(keepalive: Duration) -> Router {
    let config = ServerConfig {
        keepalive,
        ..ServerConfig::default()
    };
    let state = AppState::new(config).expect("Failed to build app state");
    routes::router(Arc::new(state))
}

/// Send a request and collect the whole response body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, String) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}

/// Split an SSE body into `(event name, JSON payload)` pairs.
pub fn parse_sse(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let mut name = String::from("message");
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim());
                }
            }
            (name, serde_json::from_str(&data).unwrap())
        })
        .collect()
}

pub fn event_names(events: &[(String, serde_json::Value)]) -> Vec<&str> {
    events.iter().map(|(name, _)| name.as_str()).collect()
}

pub async fn mount_html(server: &MockServer, route: &str, html: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html.to_string(), "text/html; charset=utf-8")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub async fn mount_xml(server: &MockServer, route: &str, xml: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(xml.to_string(), "application/xml"))
        .mount(server)
        .await;
}
