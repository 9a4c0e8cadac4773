/// Prompt keywords driving the relevance filter and link scoring
///
/// Keywords are lowercased, deduplicated, and kept in first-seen order.
/// An empty keyword set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    terms: Vec<String>,
}

impl Keywords {
    /// Splits a free-text prompt into keywords on non-alphanumeric boundaries
    ///
    /// # Example
    ///
    /// ```
    /// use rufus::Keywords;
    ///
    /// let keywords = Keywords::from_prompt("AI, machine-learning & ai");
    /// assert_eq!(keywords.terms(), &["ai", "machine", "learning"]);
    /// ```
    pub fn from_prompt(prompt: &str) -> Self {
        Self::from_list(prompt.split(|c: char| !c.is_alphanumeric()))
    }

    /// Builds a keyword set from an explicit list, such as refined keywords
    ///
    /// Entries are trimmed and lowercased; multi-word entries are kept whole.
    pub fn from_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = Vec::new();
        for item in items {
            let term = item.as_ref().trim().to_lowercase();
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Relevance filter: case-insensitive substring match against any keyword
    pub fn matches(&self, text: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.terms.iter().any(|term| text.contains(term.as_str()))
    }

    /// Total non-overlapping occurrences of all keywords in `text`
    pub fn occurrences(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.terms
            .iter()
            .map(|term| text.matches(term.as_str()).count())
            .sum()
    }

    /// Keyword occurrences per word of `text`; 0.0 when `text` has no words
    pub fn density(&self, text: &str) -> f64 {
        let words = text.split_whitespace().count();
        if words == 0 {
            return 0.0;
        }
        self.occurrences(text) as f64 / words as f64
    }
}
