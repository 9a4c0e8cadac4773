use crate::content::ContentRecord;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Computes the fingerprint of a record
///
/// The digest covers a canonical form of the payload: headings in sorted
/// order, each with its sections sorted, so two records holding the same
/// data in a different enumeration order hash identically.
///
/// # Returns
///
/// Hex-encoded SHA-256 digest
pub fn fingerprint(record: &ContentRecord) -> String {
    let canonical: BTreeMap<&str, Vec<&str>> = record
        .iter()
        .map(|(heading, sections)| {
            let mut sorted: Vec<&str> = sections.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            (heading, sorted)
        })
        .collect();

    let mut hasher = Sha256::new();
    for (heading, sections) in canonical {
        hash_field(&mut hasher, heading);
        hasher.update((sections.len() as u64).to_le_bytes());
        for section in sections {
            hash_field(&mut hasher, section);
        }
    }
    hex::encode(hasher.finalize())
}

/// Length-prefixed so field boundaries cannot be shifted between fields
fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

/// Session-scoped set of accepted fingerprints
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a record if its fingerprint is new
    ///
    /// Check and insert happen under one lock. Empty records are never
    /// accepted.
    ///
    /// # Returns
    ///
    /// * `Some(fingerprint)` - The record is new and its fingerprint is now recorded
    /// * `None` - The record is empty or a duplicate
    pub fn accept(&self, record: &ContentRecord) -> Option<String> {
        if record.is_empty() {
            return None;
        }
        let digest = fingerprint(record);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(digest.clone()).then_some(digest)
    }

    /// Number of distinct fingerprints accepted
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
