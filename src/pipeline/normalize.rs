//! Content normalization.
//!
//! Reduces a fetched HTML document to the visible text of its body. Raw markup
//! changes on almost every request (inline timestamps, CSRF tokens, ad slots)
//! even when the page reads the same, so only this text is fingerprinted.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

use crate::models::NormalizerConfig;

/// Subtrees that never contribute visible text.
const IGNORED_TAGS: [&str; 4] = ["script", "style", "link", "meta"];

/// Elements whose boundaries separate words when rendered.
const BLOCK_TAGS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "p", "section",
    "tr",
];

/// Strips volatile markup from HTML and returns comparable plain text.
#[derive(Debug, Clone)]
pub struct ContentNormalizer {
    ignored: HashSet<String>,
}

impl ContentNormalizer {
    /// Create a normalizer with the default ignored tags.
    pub fn new() -> Self {
        Self {
            ignored: IGNORED_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Create a normalizer that also strips the configured extra tags.
    pub fn with_config(config: &NormalizerConfig) -> Self {
        let mut normalizer = Self::new();
        normalizer.ignored.extend(
            config
                .extra_ignored_tags
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty()),
        );
        normalizer
    }

    /// Extract the visible body text of `raw_html`.
    ///
    /// Never fails: malformed markup is parsed best-effort, and a document
    /// without a body (or with an empty one) yields an empty string.
    pub fn normalize(&self, raw_html: &str) -> String {
        let document = Html::parse_document(raw_html);
        let Some(body) = Self::find_body(&document) else {
            return String::new();
        };

        let mut text = String::new();
        self.collect_text(body, &mut text);
        collapse_whitespace(&text)
    }

    fn find_body(document: &Html) -> Option<ElementRef<'_>> {
        document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "body")
    }

    fn collect_text(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
            } else if let Some(child_element) = ElementRef::wrap(child) {
                let name = child_element.value().name();
                if self.ignored.contains(name) {
                    continue;
                }
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    out.push(' ');
                }
                self.collect_text(child_element, out);
                if is_block {
                    out.push(' ');
                }
            }
        }
    }
}

impl Default for ContentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
