use thiserror::Error;

/// Application-wide error types for sitelens.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed or returned an unusable response.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Network/connection error (DNS, refused, reset).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response body is not an HTML document.
    #[error("Not HTML content")]
    NotHtml,

    /// Page analysis failed.
    #[error("Analyzer error: {0}")]
    AnalyzerError(String),

    /// A sitemap document could not be fetched or parsed.
    #[error("Sitemap error: {0}")]
    SitemapError(String),

    /// Rejected input (empty URL list, malformed request).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No live job with this id.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job was cancelled by request.
    #[error("cancelled")]
    Cancelled,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error belongs to a single URL check and is
    /// recorded on its result instead of failing the job.
    pub fn is_per_url(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::NotHtml
                | AppError::AnalyzerError(_)
        )
    }

    /// Message stored on a `CheckResult` for a per-URL failure.
    pub fn result_message(&self) -> String {
        match self {
            AppError::Timeout(_) => "Timeout".to_string(),
            AppError::NotHtml => "Not HTML content".to_string(),
            AppError::HttpError(msg)
            | AppError::NetworkError(msg)
            | AppError::AnalyzerError(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
