//! Document wrapper over the HTML parser
//!
//! The rest of the crate sees a parsed page only through this type: blocks of
//! text in source order and anchors. The underlying `scraper::Html` is not
//! `Send`, so a `Document` is built, read, and dropped without crossing an
//! `.await`.

use scraper::{ElementRef, Html, Selector};

/// Tags that open a new heading bucket
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Block-level tags whose text becomes a section
const CONTENT_TAGS: &[&str] = &["p", "li"];

/// Meta tags treated as pseudo-headings
const META_NAMES: &[&str] = &["description", "keywords"];

/// A unit of page content, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Text of an `h1`-`h6` element
    Heading(String),
    /// Text of a paragraph or list item
    Text(String),
    /// A `<meta name=... content=...>` tag with a recognized name
    Meta { name: String, content: String },
}

/// An `<a href>` element with its visible text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

/// A parsed HTML page
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML text
    ///
    /// Parsing is error-recovering: malformed markup still yields a document,
    /// possibly an empty one.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Returns heading, content, and meta blocks in source order
    ///
    /// A paragraph or list item nested in another one is already part of the
    /// outer element's text and yields no block of its own.
    pub fn blocks(&self) -> Vec<Block> {
        let css = HEADING_TAGS
            .iter()
            .chain(CONTENT_TAGS)
            .copied()
            .chain(std::iter::once("meta[name][content]"))
            .collect::<Vec<_>>()
            .join(", ");

        let Some(selector) = parse_selector(&css) else {
            return Vec::new();
        };

        self.html
            .select(&selector)
            .filter_map(|element| {
                let tag = element.value().name();
                if tag == "meta" {
                    let name = element.value().attr("name")?.trim().to_lowercase();
                    if !META_NAMES.contains(&name.as_str()) {
                        return None;
                    }
                    let content = collapse_whitespace(element.value().attr("content")?);
                    Some(Block::Meta { name, content })
                } else if HEADING_TAGS.contains(&tag) {
                    Some(Block::Heading(element_text(&element)))
                } else if inside_content_block(&element) {
                    None
                } else {
                    Some(Block::Text(element_text(&element)))
                }
            })
            .collect()
    }

    /// Returns every `<a href>` in source order, skipping download links
    pub fn anchors(&self) -> Vec<Anchor> {
        let Some(selector) = parse_selector("a[href]") else {
            return Vec::new();
        };

        self.html
            .select(&selector)
            .filter(|element| element.value().attr("download").is_none())
            .filter_map(|element| {
                let href = element.value().attr("href")?.to_string();
                Some(Anchor {
                    href,
                    text: element_text(&element),
                })
            })
            .collect()
    }
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::warn!("Invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

fn inside_content_block(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|ancestor| CONTENT_TAGS.contains(&ancestor.name()))
}

/// Concatenated descendant text with whitespace runs collapsed
fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_in_source_order() {
        let html = r#"<html><body>
            <h1>Title</h1>
            <p>First   paragraph</p>
            <ul><li>Item one</li></ul>
            <h2>Sub</h2>
            <p>Second</p>
        </body></html>"#;

        let blocks = Document::parse(html).blocks();
        assert_eq!(
            blocks,
            vec![
                Block::Heading("Title".to_string()),
                Block::Text("First paragraph".to_string()),
                Block::Text("Item one".to_string()),
                Block::Heading("Sub".to_string()),
                Block::Text("Second".to_string()),
            ]
        );
    }

    #[test]
    fn test_meta_blocks() {
        let html = r#"<html><head>
            <meta name="Description" content="All about  AI">
            <meta name="keywords" content="ai, ml">
            <meta name="viewport" content="width=device-width">
        </head><body></body></html>"#;

        let blocks = Document::parse(html).blocks();
        assert_eq!(
            blocks,
            vec![
                Block::Meta {
                    name: "description".to_string(),
                    content: "All about AI".to_string()
                },
                Block::Meta {
                    name: "keywords".to_string(),
                    content: "ai, ml".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_nested_heading_text() {
        let html = r#"<h2><a href="/x">AI</a> <span>News</span></h2>"#;
        let blocks = Document::parse(html).blocks();
        assert_eq!(blocks, vec![Block::Heading("AI News".to_string())]);
    }

    #[test]
    fn test_nested_content_blocks_emitted_once() {
        let html = r#"<body><h1>List</h1><ul>
            <li><p>Wrapped item</p></li>
            <li>Parent<ul><li>child</li></ul></li>
        </ul></body>"#;

        let blocks = Document::parse(html).blocks();
        assert_eq!(
            blocks,
            vec![
                Block::Heading("List".to_string()),
                Block::Text("Wrapped item".to_string()),
                Block::Text("Parent child".to_string()),
            ]
        );
    }

    #[test]
    fn test_anchors_skip_download() {
        let html = r#"<body>
            <a href="/a">Read <b>more</b></a>
            <a href="/file.pdf" download>Get</a>
            <a>No href</a>
        </body>"#;

        let anchors = Document::parse(html).anchors();
        assert_eq!(
            anchors,
            vec![Anchor {
                href: "/a".to_string(),
                text: "Read more".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_markup_still_parses() {
        let doc = Document::parse("<h1>Unclosed <p>text");
        assert!(!doc.blocks().is_empty());
    }
}
