//! Link extraction and scoring
//!
//! Outgoing links are resolved against the page URL, filtered, and ordered by
//! the keyword density of their anchor text. The sort is stable so links with
//! equal scores keep the order they appear on the page.

use crate::content::{Document, Keywords};
use crate::state::VisitedSet;
use crate::url::{normalize_url, resolve_link};
use std::collections::HashSet;
use url::Url;

/// A candidate link with its anchor-text score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLink {
    /// Absolute http(s) URL without fragment
    pub url: Url,
    /// Visible anchor text
    pub anchor_text: String,
    /// Keyword occurrences per anchor word
    pub score: f64,
}

/// Extracts outgoing links from a page, highest keyword density first
///
/// # Arguments
///
/// * `document` - The parsed page
/// * `base_url` - URL the page was fetched from; relative hrefs resolve against it
/// * `keywords` - Keywords used to score anchor text
/// * `visited` - URLs already dispatched this session; these are dropped
///
/// # Returns
///
/// Links in descending score order. A URL appearing several times on the
/// page is kept once, with the anchor text of its first occurrence.
pub fn extract_links(
    document: &Document,
    base_url: &Url,
    keywords: &Keywords,
    visited: &VisitedSet,
) -> Vec<ScoredLink> {
    let own_key = normalize_url(base_url.as_str()).ok();
    let mut seen: HashSet<Url> = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.anchors() {
        let Some(url) = resolve_link(&anchor.href, base_url) else {
            continue;
        };

        let Ok(key) = normalize_url(url.as_str()) else {
            continue;
        };

        if own_key.as_ref() == Some(&key) || !seen.insert(key) {
            continue;
        }

        if visited.contains(&url) {
            continue;
        }

        let score = keywords.density(&anchor.text);
        links.push(ScoredLink {
            url,
            anchor_text: anchor.text,
            score,
        });
    }

    // sort_by is stable; ties keep page order
    links.sort_by(|a, b| b.score.total_cmp(&a.score));
    links
}
