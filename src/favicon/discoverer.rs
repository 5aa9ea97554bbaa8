//! Candidate icon discovery from page markup and the well-known root path

use scraper::{Html, Selector};
use tracing::{debug, trace};
use url::Url;

use crate::favicon::fetcher::IconFetcher;
use crate::favicon::models::{CandidateIcon, IconSourceKind};
use crate::utils::url::UrlUtils;

/// Candidates found for one page together with the base used to resolve them
#[derive(Debug, Clone)]
pub struct Discovery {
    pub base_url: String,
    pub candidates: Vec<CandidateIcon>,
}

#[derive(Clone)]
pub struct IconDiscoverer {
    fetcher: IconFetcher,
}

impl IconDiscoverer {
    pub fn new(fetcher: IconFetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve the base, parse the page and probe `/favicon.ico`
    ///
    /// Never fails. An unreachable page yields no markup candidates but the
    /// root probe still runs.
    pub async fn discover(&self, target: &Url) -> Discovery {
        let base_url = self.fetcher.resolve_base(target).await;

        let mut candidates = match self.fetcher.fetch_page(target.as_str()).await {
            Some(html) => Self::extract_candidates(&html, &base_url),
            None => Vec::new(),
        };

        let default_url = format!("{base_url}/favicon.ico");
        let already_known = candidates.iter().any(|c| {
            c.source_kind() == IconSourceKind::DefaultFavicon
                || c.source_url() == Some(default_url.as_str())
        });
        if !already_known && self.fetcher.probe(&default_url).await {
            trace!("Root favicon present: {}", default_url);
            candidates.push(CandidateIcon::resource(
                IconSourceKind::DefaultFavicon,
                default_url,
            ));
        }

        debug!("Discovered {} icon candidates for {}", candidates.len(), target);
        Discovery {
            base_url,
            candidates,
        }
    }

    /// Parse `<link>` and `<meta>` icon references out of page markup
    pub fn extract_candidates(html: &str, base_url: &str) -> Vec<CandidateIcon> {
        let (Some(links), Some(metas)) = (selector("link[rel]"), selector("meta[name]")) else {
            return Vec::new();
        };

        let document = Html::parse_document(html);
        let mut candidates = Vec::new();

        for element in document.select(&links) {
            let attrs = element.value();
            let Some(kind) = attrs.attr("rel").and_then(link_kind) else {
                continue;
            };
            let Some(href) = attrs.attr("href").and_then(|h| UrlUtils::resolve_href(base_url, h))
            else {
                trace!("Skipping icon link without usable href");
                continue;
            };
            candidates.push(
                CandidateIcon::resource(kind, href)
                    .with_declared_type(attrs.attr("type").map(|t| t.trim().to_string()))
                    .with_size_hint(attrs.attr("sizes").and_then(parse_sizes)),
            );
        }

        for element in document.select(&metas) {
            let attrs = element.value();
            let name = attrs.attr("name").unwrap_or_default().trim().to_ascii_lowercase();
            let content = attrs.attr("content").unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            match name.as_str() {
                "twitter:image" => {
                    if let Some(url) = UrlUtils::resolve_href(base_url, content) {
                        candidates.push(CandidateIcon::resource(IconSourceKind::TwitterImage, url));
                    }
                }
                "theme-color" => candidates.push(CandidateIcon::theme_color(content)),
                _ => {}
            }
        }

        candidates
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Map a `rel` attribute onto a source kind
fn link_kind(rel: &str) -> Option<IconSourceKind> {
    let rel = rel.to_ascii_lowercase();
    let tokens: Vec<&str> = rel.split_whitespace().collect();
    let has = |t: &str| tokens.contains(&t);

    if has("apple-touch-icon") || has("apple-touch-icon-precomposed") {
        Some(IconSourceKind::AppleTouchIcon)
    } else if has("mask-icon") {
        Some(IconSourceKind::MaskIcon)
    } else if has("icon") && has("shortcut") {
        Some(IconSourceKind::ShortcutIcon)
    } else if has("icon") {
        Some(IconSourceKind::IconLink)
    } else {
        None
    }
}

/// Largest `WxH` entry of a `sizes` attribute; `any` carries no size
fn parse_sizes(sizes: &str) -> Option<(u32, u32)> {
    sizes
        .split_whitespace()
        .filter_map(|entry| {
            let (w, h) = entry.to_ascii_lowercase().split_once('x').map(|(w, h)| {
                (w.parse::<u32>().ok(), h.parse::<u32>().ok())
            })?;
            Some((w?, h?))
        })
        .filter(|(w, h)| *w > 0 && *h > 0)
        .max_by_key(|(w, h)| (*w).max(*h))
}
