use crate::content::document::{Block, Document};
use crate::content::{ContentRecord, Keywords};

/// Bucket label for `<meta name="description">`
const META_DESCRIPTION_LABEL: &str = "Meta Description";

/// Bucket label for `<meta name="keywords">`
const META_KEYWORDS_LABEL: &str = "Meta Keywords";

/// Extracts the relevant sections of a document, keyed by heading
///
/// Blocks are walked in source order. Each heading opens a new bucket and
/// paragraph or list-item text is appended to the open bucket when it passes
/// the relevance filter. Recognized meta tags become their own pseudo-heading
/// buckets under the same filter but do not change the open bucket. Text
/// before the first heading, text under an empty heading, and buckets with no
/// retained sections are dropped.
///
/// The function is pure: the same document and keywords always produce the
/// same record.
pub fn extract_content(document: &Document, keywords: &Keywords) -> ContentRecord {
    let mut record = ContentRecord::new();
    let mut open_heading: Option<String> = None;

    for block in document.blocks() {
        match block {
            Block::Heading(text) => {
                open_heading = if text.is_empty() { None } else { Some(text) };
            }
            Block::Text(text) => {
                if let Some(heading) = &open_heading {
                    if !text.is_empty() && keywords.matches(&text) {
                        record.push_section(heading, text);
                    }
                }
            }
            Block::Meta { name, content } => {
                let label = match name.as_str() {
                    "description" => META_DESCRIPTION_LABEL,
                    "keywords" => META_KEYWORDS_LABEL,
                    _ => continue,
                };
                if !content.is_empty() && keywords.matches(&content) {
                    record.push_section(label, content);
                }
            }
        }
    }

    record
}
