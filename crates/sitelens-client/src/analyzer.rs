use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use sitelens_core::error::AppError;
use sitelens_core::models::PageSignals;
use sitelens_core::traits::PageAnalyzer;

struct Selectors {
    h1: Selector,
    title: Selector,
    meta: Selector,
    link: Selector,
}

/// Extracts heading and metadata signals from an HTML document using scraper.
#[derive(Clone)]
pub struct HtmlPageAnalyzer {
    selectors: Arc<Selectors>,
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::AnalyzerError(format!("Invalid selector {css}: {e}")))
}

/// Text content with runs of whitespace collapsed to single spaces.
fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl HtmlPageAnalyzer {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            selectors: Arc::new(Selectors {
                h1: selector("h1")?,
                title: selector("title")?,
                meta: selector("meta[name][content]")?,
                link: selector("link[rel][href]")?,
            }),
        })
    }
}

impl PageAnalyzer for HtmlPageAnalyzer {
    fn analyze(&self, html: &str, url: &str) -> Result<PageSignals, AppError> {
        if !html.contains('<') {
            return Err(AppError::NotHtml);
        }

        let document = Html::parse_document(html);
        let s = &self.selectors;

        let title = document
            .select(&s.title)
            .next()
            .map(collapsed_text)
            .unwrap_or_default();

        let meta_description = document
            .select(&s.meta)
            .find(|el| {
                el.value()
                    .attr("name")
                    .is_some_and(|name| name.trim().eq_ignore_ascii_case("description"))
            })
            .and_then(|el| el.value().attr("content"))
            .map(|content| content.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        let canonical = document
            .select(&s.link)
            .find(|el| {
                el.value().attr("rel").is_some_and(|rel| {
                    rel.split_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("canonical"))
                })
            })
            .and_then(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .unwrap_or_default();

        let headings: Vec<ElementRef<'_>> = document.select(&s.h1).collect();
        let h1_text = headings.first().map(|el| collapsed_text(*el)).unwrap_or_default();

        tracing::trace!(%url, h1_count = headings.len(), "Analyzed page");

        Ok(PageSignals {
            title,
            meta_description,
            canonical,
            h1_count: headings.len(),
            h1_text,
        })
    }
}
