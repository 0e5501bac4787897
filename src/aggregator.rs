//! Multi-source aggregation
//!
//! Runs the extractor over every source in fixed order and renders the
//! results into one document bounded by a global character ceiling.

use tracing::{info, warn};

use crate::config::{BudgetSettings, DocumentSettings};
use crate::extractor::FragmentExtractor;
use crate::source::{truncate_chars, Extraction, SourceTag};

/// Separator placed between source sections
pub const SECTION_SEPARATOR: &str = "\n\n";

/// The aggregated, ceiling-bounded text sent onward to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedDocument {
    /// Non-empty sections in PROFILE, POSTS, COMMENTS order
    pub sections: Vec<(SourceTag, String)>,

    /// Final rendering, possibly truncated
    pub text: String,

    /// Length of `text` in characters
    pub total_chars: usize,

    /// Whether the global ceiling cut the rendering
    pub truncated: bool,

    /// Non-fatal problems met while collecting sources
    pub warnings: Vec<String>,
}

impl AggregatedDocument {
    /// Assemble a document from per-source extractions.
    ///
    /// Extractions are placed in `SourceTag::ALL` order whatever order they
    /// arrive in; empty ones contribute no section.
    pub fn from_extractions(extractions: Vec<Extraction>, settings: &DocumentSettings) -> Self {
        let mut warnings = Vec::new();
        let mut sections = Vec::new();

        for tag in SourceTag::ALL {
            for extraction in extractions.iter().filter(|e| e.tag == tag) {
                warnings.extend(extraction.warnings.iter().cloned());
                if !extraction.is_empty() {
                    sections.push((tag, extraction.joined_text()));
                }
            }
        }

        let rendered = sections
            .iter()
            .map(|(tag, body)| format!("{}\n{}", tag.label(), body))
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);

        let (text, truncated) = apply_ceiling(
            rendered,
            settings.global_char_ceiling,
            &settings.truncation_marker,
        );
        let total_chars = text.chars().count();

        Self {
            sections,
            text,
            total_chars,
            truncated,
            warnings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn has_section(&self, tag: SourceTag) -> bool {
        self.sections.iter().any(|(t, _)| *t == tag)
    }
}

/// Cut `text` so that it plus `marker` fits in `ceiling` characters.
///
/// The cut is by character position and may fall mid-sentence.
pub fn apply_ceiling(text: String, ceiling: usize, marker: &str) -> (String, bool) {
    if text.chars().count() <= ceiling {
        return (text, false);
    }

    let keep = ceiling.saturating_sub(marker.chars().count());
    let mut cut = truncate_chars(&text, keep).to_string();
    cut.push_str(truncate_chars(marker, ceiling));
    (cut, true)
}

/// Collects all sources for one user.
pub struct Aggregator {
    extractor: FragmentExtractor,
    base_url: String,
    budgets: BudgetSettings,
    document: DocumentSettings,
}

impl Aggregator {
    pub fn new(
        extractor: FragmentExtractor,
        base_url: impl Into<String>,
        budgets: BudgetSettings,
        document: DocumentSettings,
    ) -> Self {
        Self {
            extractor,
            base_url: base_url.into(),
            budgets,
            document,
        }
    }

    /// Extract each source in turn and build the document.
    pub async fn aggregate(&self, username: &str) -> AggregatedDocument {
        info!(username = %username, "Extracting user profile");

        let mut extractions = Vec::with_capacity(SourceTag::ALL.len());
        for tag in SourceTag::ALL {
            let extraction = match tag.url_for(&self.base_url, username) {
                Ok(url) => {
                    self.extractor
                        .extract(url.as_str(), tag, self.budgets.for_tag(tag))
                        .await
                }
                Err(e) => {
                    warn!(source = %tag, error = %e.format_for_log(), "Could not build source URL");
                    Extraction::empty(tag, e.to_string())
                }
            };
            extractions.push(extraction);
        }

        let document = AggregatedDocument::from_extractions(extractions, &self.document);

        info!(
            sections = document.sections.len(),
            total_chars = document.total_chars,
            truncated = document.truncated,
            warnings = document.warnings.len(),
            "Document aggregated"
        );

        document
    }
}
