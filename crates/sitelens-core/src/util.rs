use crate::error::AppError;

/// Prefix a default scheme when the URL has none.
///
/// Example: `"example.com/about"` → `"https://example.com/about"`
pub fn normalize_url(raw: &str) -> String {
    let url = raw.trim();
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{url}")
    }
}

/// Trim entries and drop blanks. An empty result is a validation error.
pub fn clean_url_list<I, S>(urls: I) -> Result<Vec<String>, AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let cleaned: Vec<String> = urls
        .into_iter()
        .map(|u| u.as_ref().trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Err(AppError::ValidationError(
            "urls must contain at least one non-empty URL".into(),
        ));
    }
    Ok(cleaned)
}
