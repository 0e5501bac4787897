//! Prompt composition
//!
//! Wraps the aggregated document in the instruction template. Rendering is
//! plain placeholder substitution with no conditional sections.

use crate::aggregator::AggregatedDocument;

/// Checklist of persona attributes requested from the model
pub const DEFAULT_TEMPLATE: &str = "
Analyze the following Reddit posts and comments by user '{username}' and
build a detailed user persona.

Include:
- Age range
- Gender
- Occupation
- Interests
- Personality traits
- Political or philosophical leanings
- Writing style or tone
- Preferred subreddits
- Behavior patterns
- Frustrations
- Goals
- Motivations
- Other relevant characteristics

Text:
{text}
";

/// The single request string sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Template the prompt was rendered from
    pub instructions: String,

    /// Document text substituted for `{text}`
    pub body: String,

    /// Rendered prompt
    pub text: String,
}

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Rendered length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Renders the instruction template for a user and document.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    template: String,
}

impl PromptComposer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn compose(&self, username: &str, document: &AggregatedDocument) -> Prompt {
        let text = render(&self.template, &[("username", username), ("text", &document.text)]);
        Prompt {
            instructions: self.template.clone(),
            body: document.text.clone(),
            text,
        }
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Substitute `{name}` placeholders in one pass.
///
/// Substituted values are never rescanned, so a username or document
/// containing `{text}` comes through verbatim. Unknown placeholders are
/// left untouched.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                output.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }

    output.push_str(rest);
    output
}
