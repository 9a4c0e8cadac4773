use crate::content::{ContentRecord, Deduplicator};
use crate::url::normalize_url;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use url::Url;

/// A URL admitted to the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// The URL to fetch, as discovered
    pub url: Url,

    /// Levels left including this one; children get `depth - 1`
    pub depth: u32,

    /// Whether the headless renderer may be used for this page
    pub render: bool,
}

impl CrawlTask {
    pub fn new(url: Url, depth: u32, render: bool) -> Self {
        Self { url, depth, render }
    }

    /// Builds the task for a link discovered on this page
    ///
    /// Returns None when this task is at the depth floor.
    pub fn child(&self, url: Url) -> Option<CrawlTask> {
        (self.depth > 1).then(|| CrawlTask::new(url, self.depth - 1, self.render))
    }
}

/// Normalized URLs already dispatched in this session
///
/// Cloning shares the underlying set. The set only grows.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a URL for dispatch
    ///
    /// Check and insert happen under one lock, so concurrent callers racing
    /// on the same URL see exactly one `true`. URLs that fail normalization
    /// are never claimed.
    pub fn try_claim(&self, url: &Url) -> bool {
        let Ok(key) = normalize_url(url.as_str()) else {
            return false;
        };
        self.lock().insert(key.into())
    }

    /// Returns true if the URL (after normalization) was already claimed
    pub fn contains(&self, url: &Url) -> bool {
        match normalize_url(url.as_str()) {
            Ok(key) => self.lock().contains(key.as_str()),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Accepted records keyed by URL, in acceptance order
///
/// Serializes as `{url: {heading: [section, ...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pages: Vec<(String, ContentRecord)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a page; a URL already present has its record replaced
    pub fn insert(&mut self, url: String, record: ContentRecord) {
        match self.pages.iter_mut().find(|(existing, _)| *existing == url) {
            Some((_, slot)) => *slot = record,
            None => self.pages.push((url, record)),
        }
    }

    pub fn get(&self, url: &str) -> Option<&ContentRecord> {
        self.pages
            .iter()
            .find(|(existing, _)| existing == url)
            .map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentRecord)> {
        self.pages
            .iter()
            .map(|(url, record)| (url.as_str(), record))
    }

    /// Flattens to (URL, heading, sections joined by single spaces) rows
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, String)> {
        self.iter().flat_map(|(url, record)| {
            record
                .iter()
                .map(move |(heading, sections)| (url, heading, sections.join(" ")))
        })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pages.len()))?;
        for (url, record) in &self.pages {
            map.serialize_entry(url, record)?;
        }
        map.end()
    }
}

/// Session aggregate owned by the coordinator
///
/// The visited set is shared with workers; fingerprints and results are only
/// mutated by the coordinator.
#[derive(Debug, Default)]
pub struct CrawlState {
    pub visited: VisitedSet,
    pub fingerprints: Deduplicator,
    pub results: ResultSet,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session around a visited set that other components already share
    pub fn with_visited(visited: VisitedSet) -> Self {
        Self {
            visited,
            ..Self::default()
        }
    }

    /// Runs a record through deduplication and stores it if new
    ///
    /// # Returns
    ///
    /// * `true` - The record was accepted and added to the results
    /// * `false` - The record was empty or a duplicate
    pub fn accept(&mut self, url: &Url, record: ContentRecord) -> bool {
        if self.fingerprints.accept(&record).is_none() {
            return false;
        }
        self.results.insert(url.to_string(), record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn record(heading: &str, section: &str) -> ContentRecord {
        vec![(heading, vec![section])].into_iter().collect()
    }

    #[test]
    fn test_child_depth_decreases() {
        let task = CrawlTask::new(url("https://example.com/"), 2, false);
        let child = task.child(url("https://example.com/a")).unwrap();
        assert_eq!(child.depth, 1);
        assert!(child.child(url("https://example.com/b")).is_none());
    }

    #[test]
    fn test_visited_claim_once() {
        let visited = VisitedSet::new();
        assert!(visited.try_claim(&url("https://example.com/page")));
        assert!(!visited.try_claim(&url("https://EXAMPLE.com/page/#top")));
        assert!(visited.contains(&url("https://example.com/page")));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_visited_shared_between_clones() {
        let visited = VisitedSet::new();
        let handle = visited.clone();
        assert!(handle.try_claim(&url("https://example.com/")));
        assert!(visited.contains(&url("https://example.com/")));
    }

    #[test]
    fn test_visited_concurrent_claims() {
        let visited = VisitedSet::new();
        let target = url("https://example.com/contended");

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| visited.try_claim(&target) as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(winners, 1);
    }

    #[test]
    fn test_crawl_state_rejects_duplicate_content() {
        let mut state = CrawlState::new();
        assert!(state.accept(&url("https://example.com/"), record("AI", "AI text")));
        assert!(!state.accept(&url("https://example.com/about"), record("AI", "AI text")));
        assert_eq!(state.results.len(), 1);
    }

    #[test]
    fn test_rows_flatten_sections() {
        let mut results = ResultSet::new();
        let page: ContentRecord = vec![("H1", vec!["a", "b"]), ("H2", vec!["c"])]
            .into_iter()
            .collect();
        results.insert("https://example.com/".to_string(), page);

        let rows: Vec<_> = results.rows().collect();
        assert_eq!(
            rows,
            vec![
                ("https://example.com/", "H1", "a b".to_string()),
                ("https://example.com/", "H2", "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_result_set_serializes_nested() {
        let mut results = ResultSet::new();
        results.insert("https://example.com/".to_string(), record("AI", "x"));
        assert_eq!(
            serde_json::to_string(&results).unwrap(),
            r#"{"https://example.com/":{"AI":["x"]}}"#
        );
    }
}
