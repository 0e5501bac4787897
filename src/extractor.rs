//! Fragment extraction for a single source
//!
//! Fetches one page, selects candidate elements through the markup
//! boundary and accepts fragments until the source budget is spent.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fetch::PageFetcher;
use crate::markup::CandidateSelector;
use crate::source::{truncate_chars, Extraction, Fragment, SourceBudget, SourceTag, FRAGMENT_SEPARATOR};

/// Turns one source page into a bounded list of fragments.
pub struct FragmentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    selector: CandidateSelector,
}

impl FragmentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, selector: CandidateSelector) -> Self {
        Self { fetcher, selector }
    }

    /// Fetch `source_url` once and extract its fragments.
    ///
    /// Never fails: a fetch error yields an empty extraction carrying a
    /// warning, so the remaining sources still run.
    pub async fn extract(&self, source_url: &str, tag: SourceTag, budget: &SourceBudget) -> Extraction {
        let body = match self.fetcher.fetch(source_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source = %tag, error = %e.format_for_log(), "Source fetch failed");
                return Extraction::empty(tag, e.to_string());
            }
        };

        let candidates = self.selector.candidate_texts(&body);
        let candidate_count = candidates.len();
        let fragments = select_fragments(tag, candidates, budget);

        let mut warnings = Vec::new();
        if candidate_count == 0 {
            warnings.push(format!("No candidate elements found at {}", source_url));
        }

        info!(
            source = %tag,
            candidates = candidate_count,
            fragments = fragments.len(),
            chars = fragments.iter().map(|f| f.length).sum::<usize>(),
            "Source extracted"
        );

        Extraction { tag, fragments, warnings }
    }
}

/// Accept candidates in order until `budget` is exhausted.
///
/// The running total is the length of the joined text, separators
/// included, so the joined text never exceeds `max_source_chars`. A
/// candidate that would overflow is cut to the remaining room and ends the
/// source; it is dropped instead if that room is below the minimum.
pub fn select_fragments<I>(tag: SourceTag, candidates: I, budget: &SourceBudget) -> Vec<Fragment>
where
    I: IntoIterator<Item = String>,
{
    let separator_len = FRAGMENT_SEPARATOR.chars().count();
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut used = 0usize;

    for candidate in candidates {
        if fragments.len() >= budget.max_fragments || used >= budget.max_source_chars {
            break;
        }

        if candidate.trim().is_empty() || candidate.chars().count() < budget.min_fragment_chars {
            continue;
        }

        let separator = if fragments.is_empty() { 0 } else { separator_len };
        let room = budget.max_source_chars.saturating_sub(used + separator);
        let limit = budget.max_fragment_chars.min(room);
        if limit == 0 || limit < budget.min_fragment_chars {
            debug!(source = %tag, used, "Source budget exhausted");
            break;
        }

        let fragment = Fragment::new(tag, truncate_chars(&candidate, limit).to_string());
        used += separator + fragment.length;
        fragments.push(fragment);
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::markup::DEFAULT_CANDIDATE_SELECTOR;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedFetcher {
        body: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .clone()
                .ok_or_else(|| Error::fetch(url, "connection refused"))
        }
    }

    fn extractor(body: Option<String>) -> (FragmentExtractor, Arc<CannedFetcher>) {
        let fetcher = Arc::new(CannedFetcher { body, calls: AtomicUsize::new(0) });
        let selector = CandidateSelector::parse(DEFAULT_CANDIDATE_SELECTOR).unwrap();
        (FragmentExtractor::new(fetcher.clone(), selector), fetcher)
    }

    fn page(items: &[String]) -> String {
        let divs: String = items
            .iter()
            .map(|t| format!(r#"<div class="subgrid-container">{}</div>"#, t))
            .collect();
        format!("<html><body>{}</body></html>", divs)
    }

    fn text_of(len: usize, fill: char) -> String {
        std::iter::repeat(fill).take(len).collect()
    }

    #[test]
    fn test_short_candidates_are_discarded() {
        let budget = SourceTag::Posts.default_budget();
        let candidates = vec![text_of(49, 'a'), text_of(50, 'b'), text_of(10, 'c')];

        let fragments = select_fragments(SourceTag::Posts, candidates, &budget);

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, text_of(50, 'b'));
    }

    #[test]
    fn test_fragments_truncated_to_max_chars() {
        let budget = SourceTag::Comments.default_budget();
        let fragments = select_fragments(SourceTag::Comments, vec![text_of(1000, 'x')], &budget);

        assert_eq!(fragments[0].length, 300);
        assert_eq!(fragments[0].source_tag, SourceTag::Comments);
    }

    #[test]
    fn test_max_fragments_stops_acceptance() {
        let budget = SourceBudget {
            min_fragment_chars: 1,
            max_fragments: 3,
            max_fragment_chars: 100,
            max_source_chars: 10_000,
        };
        let candidates: Vec<String> = (0..10).map(|i| format!("fragment {}", i)).collect();

        let fragments = select_fragments(SourceTag::Profile, candidates, &budget);

        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["fragment 0", "fragment 1", "fragment 2"]);
    }

    #[test]
    fn test_source_chars_bound_joined_text() {
        let budget = SourceBudget {
            min_fragment_chars: 10,
            max_fragments: 100,
            max_fragment_chars: 400,
            max_source_chars: 1000,
        };
        let candidates: Vec<String> = (0..10).map(|_| text_of(400, 'p')).collect();

        let fragments = select_fragments(SourceTag::Posts, candidates, &budget);
        let extraction = Extraction { tag: SourceTag::Posts, fragments, warnings: vec![] };

        // 400 + 5 + 400 + 5 + 190
        assert_eq!(extraction.fragments.len(), 3);
        assert_eq!(extraction.fragments[2].length, 190);
        assert_eq!(extraction.joined_text().chars().count(), 1000);
    }

    #[test]
    fn test_remaining_room_below_minimum_ends_source() {
        let budget = SourceBudget {
            min_fragment_chars: 50,
            max_fragments: 100,
            max_fragment_chars: 100,
            max_source_chars: 130,
        };
        let candidates = vec![text_of(100, 'a'), text_of(100, 'b'), text_of(60, 'c')];

        let fragments = select_fragments(SourceTag::Posts, candidates, &budget);

        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_blank_candidates_never_become_fragments() {
        let budget = SourceBudget {
            min_fragment_chars: 0,
            max_fragments: 10,
            max_fragment_chars: 100,
            max_source_chars: 1000,
        };
        let candidates = vec![String::new(), "   ".to_string()];

        assert!(select_fragments(SourceTag::Profile, candidates, &budget).is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_page_yields_no_section() {
        let (extractor, _) = extractor(Some(page(&["   ".to_string(), "\n\t".to_string()])));
        let budget = SourceBudget {
            min_fragment_chars: 0,
            ..SourceTag::Profile.default_budget()
        };

        let extraction = extractor
            .extract("https://example.com/user/a/", SourceTag::Profile, &budget)
            .await;
        let doc = crate::aggregator::AggregatedDocument::from_extractions(
            vec![extraction],
            &crate::config::DocumentSettings::default(),
        );

        assert!(doc.is_empty());
        assert!(!doc.text.contains("=== PROFILE ==="));
    }

    #[test]
    fn test_encounter_order_and_duplicates_kept() {
        let budget = SourceBudget {
            min_fragment_chars: 1,
            max_fragments: 10,
            max_fragment_chars: 100,
            max_source_chars: 1000,
        };
        let candidates = vec!["zeta".to_string(), "alpha".to_string(), "zeta".to_string()];

        let fragments = select_fragments(SourceTag::Comments, candidates, &budget);

        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["zeta", "alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_extract_from_page() {
        let items: Vec<String> = (0..4)
            .map(|i| format!("Comment number {} with   enough\n text to pass the threshold", i))
            .collect();
        let (extractor, fetcher) = extractor(Some(page(&items)));
        let budget = SourceTag::Comments.default_budget();

        let extraction = extractor
            .extract("https://example.com/user/a/comments/", SourceTag::Comments, &budget)
            .await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(extraction.fragments.len(), 4);
        assert_eq!(
            extraction.fragments[0].text,
            "Comment number 0 with enough text to pass the threshold"
        );
        assert!(extraction.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_extract_fetch_failure_is_warning() {
        let (extractor, fetcher) = extractor(None);
        let budget = SourceTag::Profile.default_budget();

        let extraction = extractor
            .extract("https://example.com/user/a/", SourceTag::Profile, &budget)
            .await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(extraction.is_empty());
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn test_extract_page_without_candidates_warns() {
        let (extractor, _) = extractor(Some("<html><p>login wall</p></html>".to_string()));
        let budget = SourceTag::Posts.default_budget();

        let extraction = extractor
            .extract("https://example.com/user/a/submitted/", SourceTag::Posts, &budget)
            .await;

        assert!(extraction.is_empty());
        assert!(extraction.warnings[0].contains("No candidate elements"));
    }
}
