//! Sources, budgets and fragments
//!
//! A user's public activity is read from three paginated sources. Each
//! source has its own budget that bounds how much of it reaches the prompt.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Separator placed between fragments of one source
pub const FRAGMENT_SEPARATOR: &str = "\n---\n";

// ─────────────────────────────────────────────────────────────────
// Source Tag
// ─────────────────────────────────────────────────────────────────

/// The three origins of scraped text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    /// The user's overview page.
    Profile,
    /// Submitted posts.
    Posts,
    /// Comments.
    Comments,
}

impl SourceTag {
    /// All sources in document order.
    pub const ALL: [SourceTag; 3] = [SourceTag::Profile, SourceTag::Posts, SourceTag::Comments];

    /// Upper-case name used in section labels.
    pub fn name(&self) -> &'static str {
        match self {
            SourceTag::Profile => "PROFILE",
            SourceTag::Posts => "POSTS",
            SourceTag::Comments => "COMMENTS",
        }
    }

    /// Label line heading this source's section.
    pub fn label(&self) -> String {
        format!("=== {} ===", self.name())
    }

    /// Trailing path segment below `/user/<name>/`, if any.
    fn listing(&self) -> Option<&'static str> {
        match self {
            SourceTag::Profile => None,
            SourceTag::Posts => Some("submitted"),
            SourceTag::Comments => Some("comments"),
        }
    }

    /// Build the page URL for `username` under `base_url`.
    ///
    /// The username is percent-encoded as a single path segment and the
    /// path always ends with `/`.
    pub fn url_for(&self, base_url: &str, username: &str) -> Result<Url> {
        let mut url = Url::parse(base_url).map_err(|e| Error::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|_| Error::InvalidUrl {
                url: base_url.to_string(),
                message: "URL cannot be a base".to_string(),
            })?;
            segments.pop_if_empty().push("user").push(username);
            if let Some(listing) = self.listing() {
                segments.push(listing);
            }
            segments.push("");
        }

        Ok(url)
    }

    /// Default budget for this source.
    pub fn default_budget(&self) -> SourceBudget {
        match self {
            SourceTag::Profile => SourceBudget {
                min_fragment_chars: 30,
                max_fragments: 8,
                max_fragment_chars: 300,
                max_source_chars: 2500,
            },
            SourceTag::Posts => SourceBudget {
                min_fragment_chars: 50,
                max_fragments: 10,
                max_fragment_chars: 400,
                max_source_chars: 4000,
            },
            SourceTag::Comments => SourceBudget {
                min_fragment_chars: 30,
                max_fragments: 15,
                max_fragment_chars: 300,
                max_source_chars: 4000,
            },
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────
// Source Budget
// ─────────────────────────────────────────────────────────────────

/// Caps bounding one source's contribution. All lengths are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBudget {
    /// Candidates shorter than this are discarded
    pub min_fragment_chars: usize,

    /// Maximum number of accepted fragments
    pub max_fragments: usize,

    /// Each fragment is truncated to this length
    pub max_fragment_chars: usize,

    /// Ceiling for the source's joined text, separators included
    pub max_source_chars: usize,
}

impl SourceBudget {
    pub fn validate(&self, tag: SourceTag) -> Result<()> {
        let field = |name: &str| format!("budgets.{}.{}", tag.name().to_lowercase(), name);

        if self.max_fragments == 0 {
            return Err(Error::config_field_invalid(
                field("max_fragments"),
                "max_fragments must be greater than 0",
            ));
        }
        if self.max_fragment_chars == 0 || self.max_source_chars == 0 {
            return Err(Error::config_field_invalid(
                field("max_fragment_chars"),
                "character limits must be greater than 0",
            ));
        }
        if self.min_fragment_chars == 0 {
            return Err(Error::config_field_invalid(
                field("min_fragment_chars"),
                "min_fragment_chars must be greater than 0",
            ));
        }
        if self.min_fragment_chars > self.max_fragment_chars {
            return Err(Error::config_field_invalid(
                field("min_fragment_chars"),
                "min_fragment_chars cannot exceed max_fragment_chars",
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Fragment
// ─────────────────────────────────────────────────────────────────

/// One accepted, trimmed unit of scraped text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub source_tag: SourceTag,
    pub text: String,
    /// Length of `text` in characters
    pub length: usize,
}

impl Fragment {
    pub fn new(source_tag: SourceTag, text: String) -> Self {
        let length = text.chars().count();
        Self { source_tag, text, length }
    }
}

/// Fragments accepted from one source plus any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub tag: SourceTag,
    pub fragments: Vec<Fragment>,
    pub warnings: Vec<String>,
}

impl Extraction {
    pub fn empty(tag: SourceTag, warning: impl Into<String>) -> Self {
        Self {
            tag,
            fragments: Vec::new(),
            warnings: vec![warning.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments joined with [`FRAGMENT_SEPARATOR`]
    pub fn joined_text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR)
    }
}

/// Take at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
