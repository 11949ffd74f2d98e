use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use sitelens_core::error::AppError;
use sitelens_core::traits::{FetchResponse, Fetcher};

const USER_AGENT: &str = concat!("sitelens/", env!("CARGO_PKG_VERSION"), " (page structure checker)");
const MAX_REDIRECTS: usize = 10;

/// HTTP fetcher using reqwest.
///
/// Follows up to 10 redirects and reports the final status. Non-2xx responses
/// are returned as-is; only transport failures become errors.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_user_agent(USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, AppError> {
        let timeout_ms = timeout.as_millis() as u64;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                AppError::Timeout(timeout_ms)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_err)?;

        tracing::trace!(%url, status, bytes = body.len(), "Fetched");
        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><h1>Hi</h1></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let response = fetcher
            .fetch(&format!("{}/page", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_html());
        assert_eq!(response.body, "<html><h1>Hi</h1></html>");
    }

    #[tokio::test]
    async fn test_error_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let response = fetcher
            .fetch(&format!("{}/missing", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let response = fetcher
            .fetch(&format!("{}/old", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "moved");
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher
            .fetch(&server.uri(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(100)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:1/", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NetworkError(_)));
    }
}
