use serde::{Deserialize, Serialize};

/// Structured fields extracted from an HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSignals {
    pub title: String,
    pub meta_description: String,
    pub canonical: String,
    /// Number of `<h1>` elements on the page.
    pub h1_count: usize,
    /// Text of the first `<h1>`, whitespace-collapsed.
    pub h1_text: String,
}

/// Outcome of checking a single URL.
///
/// Written at most once into a job's result slot and never mutated afterwards.
/// `status` and `error` may both be set (e.g. a 200 response that is not HTML).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub url: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub response_time_ms: u64,
    pub has_h1: bool,
    pub h1_count: usize,
    pub h1_length: usize,
    pub multiple_h1: bool,
    pub missing_h1: bool,
    pub title: String,
    pub meta_description: String,
    pub canonical: String,
    pub h1_text: String,
    pub error: Option<String>,
}

impl CheckResult {
    /// Result for a URL that could not be fetched at all.
    pub fn failed(url: impl Into<String>, response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response_time_ms,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Result for a fetched response, before analysis.
    pub fn fetched(url: impl Into<String>, status: u16, response_time_ms: u64) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            ok: (200..300).contains(&status),
            response_time_ms,
            ..Self::default()
        }
    }

    /// Fill in the heading and metadata fields from page analysis.
    pub fn with_signals(mut self, signals: PageSignals) -> Self {
        self.has_h1 = signals.h1_count > 0;
        self.h1_count = signals.h1_count;
        self.h1_length = signals.h1_text.chars().count();
        self.multiple_h1 = signals.h1_count > 1;
        self.missing_h1 = signals.h1_count == 0;
        self.title = signals.title;
        self.meta_description = signals.meta_description;
        self.canonical = signals.canonical;
        self.h1_text = signals.h1_text;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
