//! Markup boundary
//!
//! The only place that knows how the target site lays out its per-item
//! containers. When the upstream markup changes, update this module.

use scraper::{Html, Selector};

use crate::error::{Error, Result};

/// Container class wrapping each item on a user's listing pages
pub const DEFAULT_CANDIDATE_SELECTOR: &str = "div.subgrid-container";

/// Compiled selector for candidate fragments.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    selector: Selector,
}

impl CandidateSelector {
    pub fn parse(css: &str) -> Result<Self> {
        let selector = Selector::parse(css).map_err(|e| {
            Error::config_field_invalid("scraper.selector", format!("invalid selector '{}': {}", css, e))
        })?;
        Ok(Self { selector })
    }

    /// Plain text of every matching element, in document order, with
    /// whitespace runs collapsed to single spaces.
    pub fn candidate_texts(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.selector)
            .map(|element| collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
            .collect()
    }
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
