use quick_xml::Reader;
use quick_xml::events::Event;
use sitelens_core::error::AppError;
use sitelens_core::traits::{SitemapDocument, SitemapParser};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    UrlSet,
    SitemapIndex,
}

/// Parses `<urlset>` and `<sitemapindex>` documents with quick-xml.
///
/// `<loc>` entries of a urlset are pages, those of a sitemap index are nested
/// sitemaps. Only a `<loc>` directly inside `<url>` or `<sitemap>` counts, so
/// extension entries such as `<image:loc>` are ignored. Relative locations are
/// resolved against the document URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlSitemapParser;

impl XmlSitemapParser {
    pub fn new() -> Self {
        Self
    }
}

fn xml_error(base_url: &str, e: impl std::fmt::Display) -> AppError {
    AppError::SitemapError(format!("Malformed sitemap {base_url}: {e}"))
}

fn resolve(base: Option<&Url>, loc: &str) -> Option<String> {
    match Url::parse(loc) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(loc).ok()).map(|u| u.to_string()),
    }
}

/// `<url>` and `<sitemap>` are the only elements whose `<loc>` is an entry.
fn is_entry(parent: Option<&Vec<u8>>) -> bool {
    matches!(parent.map(Vec::as_slice), Some(b"url" | b"sitemap"))
}

impl SitemapParser for XmlSitemapParser {
    fn parse(&self, xml: &str, base_url: &str) -> Result<SitemapDocument, AppError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut root: Option<Root> = None;
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut in_loc = false;
        let mut current = String::new();
        let mut locs = Vec::new();

        loop {
            match reader.read_event().map_err(|e| xml_error(base_url, e))? {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    match name.as_slice() {
                        b"urlset" if root.is_none() => root = Some(Root::UrlSet),
                        b"sitemapindex" if root.is_none() => root = Some(Root::SitemapIndex),
                        b"loc" if is_entry(stack.last()) => {
                            in_loc = true;
                            current.clear();
                        }
                        _ => {}
                    }
                    stack.push(name);
                }
                Event::End(_) => {
                    let closed = stack.pop();
                    if in_loc && closed.as_deref() == Some(b"loc".as_slice()) {
                        in_loc = false;
                        let loc = current.trim();
                        if !loc.is_empty() {
                            locs.push(loc.to_string());
                        }
                    }
                }
                Event::Text(t) if in_loc => {
                    current.push_str(&t.unescape().map_err(|e| xml_error(base_url, e))?);
                }
                Event::CData(t) if in_loc => {
                    current.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let Some(root) = root else {
            return Err(AppError::SitemapError(format!(
                "No <urlset> or <sitemapindex> in {base_url}"
            )));
        };

        let base = Url::parse(base_url).ok();
        let mut resolved = Vec::with_capacity(locs.len());
        for loc in locs {
            match resolve(base.as_ref(), &loc) {
                Some(url) => resolved.push(url),
                None => tracing::warn!(%base_url, %loc, "Skipping unresolvable sitemap location"),
            }
        }

        Ok(match root {
            Root::UrlSet => SitemapDocument {
                sitemaps: Vec::new(),
                pages: resolved,
            },
            Root::SitemapIndex => SitemapDocument {
                sitemaps: resolved,
                pages: Vec::new(),
            },
        })
    }
}
