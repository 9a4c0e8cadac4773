//! Content module for topical text extraction
//!
//! This module contains everything that turns a fetched page into a
//! relevance-filtered record:
//! - Prompt keyword handling and the relevance filter
//! - A thin document wrapper over the HTML parser
//! - Heading-keyed section extraction
//! - Content fingerprinting for duplicate suppression

mod dedup;
mod document;
mod extractor;
mod keywords;

pub use dedup::{fingerprint, Deduplicator};
pub use document::{Anchor, Block, Document};
pub use extractor::extract_content;
pub use keywords::Keywords;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Relevant text of one page, keyed by heading in source order
///
/// Serializes as a JSON object `{heading: [section, ...]}` whose keys keep
/// the order the headings appeared on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentRecord {
    buckets: Vec<(String, Vec<String>)>,
}

impl ContentRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a section under `heading`, opening the bucket if needed
    ///
    /// A heading label seen earlier reuses its existing bucket.
    pub fn push_section(&mut self, heading: &str, section: String) {
        match self.buckets.iter_mut().find(|(label, _)| label == heading) {
            Some((_, sections)) => sections.push(section),
            None => self.buckets.push((heading.to_string(), vec![section])),
        }
    }

    /// Returns the sections stored under a heading
    pub fn get(&self, heading: &str) -> Option<&[String]> {
        self.buckets
            .iter()
            .find(|(label, _)| label == heading)
            .map(|(_, sections)| sections.as_slice())
    }

    /// Iterates over (heading, sections) pairs in source order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets
            .iter()
            .map(|(label, sections)| (label.as_str(), sections.as_slice()))
    }

    /// Number of headings with retained content
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<H, S> FromIterator<(H, Vec<S>)> for ContentRecord
where
    H: Into<String>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (H, Vec<S>)>>(iter: I) -> Self {
        let mut record = ContentRecord::new();
        for (heading, sections) in iter {
            let heading = heading.into();
            for section in sections {
                record.push_section(&heading, section.into());
            }
        }
        record
    }
}

impl Serialize for ContentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (heading, sections) in &self.buckets {
            map.serialize_entry(heading, sections)?;
        }
        map.end()
    }
}
