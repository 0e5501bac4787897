//! End-to-end pipeline tests with stub network collaborators

mod common;

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use common::{StubFetcher, StubTransport};
use persona_builder::config::AppConfig;
use persona_builder::error::Error;
use persona_builder::pipeline::PersonaPipeline;
use persona_builder::prompt::DEFAULT_TEMPLATE;
use persona_builder::source::{SourceTag, FRAGMENT_SEPARATOR};

fn config_for(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.output.dir = dir.join("out").to_string_lossy().into_owned();
    config
}

fn pipeline(config: &AppConfig, fetcher: &Arc<StubFetcher>, transport: &Arc<StubTransport>) -> PersonaPipeline {
    PersonaPipeline::with_collaborators(config, fetcher.clone(), transport.clone()).unwrap()
}

fn fragment_count(section: &str) -> usize {
    section.matches(FRAGMENT_SEPARATOR).count() + 1
}

#[tokio::test]
async fn test_full_run_writes_both_files() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let fetcher = Arc::new(StubFetcher::with_counts(10, 12, 5));
    let transport = Arc::new(StubTransport::completion("PERSONA"));

    let report = pipeline(&config, &fetcher, &transport)
        .run("spez", "deepseek/deepseek-r1-0528", Some("sk-test"))
        .await
        .unwrap();

    let requested = fetcher.requested();
    assert_eq!(
        requested,
        [
            "https://www.reddit.com/user/spez/",
            "https://www.reddit.com/user/spez/submitted/",
            "https://www.reddit.com/user/spez/comments/",
        ]
    );

    let doc = &report.document;
    let order: Vec<_> = doc.sections.iter().map(|(t, _)| *t).collect();
    assert_eq!(order, SourceTag::ALL);
    assert_eq!(fragment_count(&doc.sections[0].1), 8);
    assert_eq!(fragment_count(&doc.sections[1].1), 10);
    assert_eq!(fragment_count(&doc.sections[2].1), 5);
    assert!(!doc.truncated);

    let out = temp.path().join("out");
    assert_eq!(std::fs::read_to_string(out.join("persona_spez.txt")).unwrap(), "PERSONA");
    assert_eq!(std::fs::read_to_string(out.join("persona_spez.md")).unwrap(), "PERSONA");
    assert_eq!(report.writes.written.len(), 2);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "deepseek/deepseek-r1-0528");
    let user_message = &requests[0].messages[1].content;
    assert!(user_message.contains("by user 'spez'"));
    assert!(user_message.contains("=== PROFILE ===\nPROFILE item 00"));
    assert_eq!(user_message.chars().count(), report.prompt_chars);
}

#[tokio::test]
async fn test_payment_required_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let fetcher = Arc::new(StubFetcher::with_counts(3, 3, 3));
    let transport = Arc::new(StubTransport::new(402, r#"{"error":{"message":"Insufficient credits"}}"#));

    let err = pipeline(&config, &fetcher, &transport)
        .run("spez", "m", Some("sk-test"))
        .await
        .unwrap_err();

    match &err {
        Error::ApiStatus { status, body } => {
            assert_eq!(*status, 402);
            assert!(body.contains("Insufficient credits"));
        }
        other => panic!("expected ApiStatus, got {:?}", other),
    }
    assert!(err.suggestion().unwrap().contains("payment"));
    assert!(!temp.path().join("out").exists());
}

#[tokio::test]
async fn test_all_fetches_failing_still_sends_template() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let fetcher = Arc::new(StubFetcher::failing());
    let transport = Arc::new(StubTransport::completion("A quiet account."));

    let report = pipeline(&config, &fetcher, &transport)
        .run("ghost", "m", Some("sk-test"))
        .await
        .unwrap();

    assert_eq!(fetcher.requested().len(), 3);
    assert!(report.document.is_empty());
    assert_eq!(report.document.text, "");
    assert_eq!(report.document.warnings.len(), 3);

    let expected_prompt = DEFAULT_TEMPLATE
        .replace("{username}", "ghost")
        .replace("{text}", "");
    assert_eq!(transport.requests()[0].messages[1].content, expected_prompt);
    assert!(temp.path().join("out/persona_ghost.md").exists());
}

#[tokio::test]
async fn test_missing_key_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let fetcher = Arc::new(StubFetcher::with_counts(1, 1, 1));
    let transport = Arc::new(StubTransport::completion("PERSONA"));

    let err = pipeline(&config, &fetcher, &transport)
        .run("spez", "m", Some(""))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingApiKey));
    assert!(fetcher.requested().is_empty());
    assert!(transport.requests().is_empty());
    assert!(!temp.path().join("out").exists());
}

#[tokio::test]
async fn test_global_ceiling_bounds_document() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(temp.path());
    config.document.global_char_ceiling = 500;
    let fetcher = Arc::new(StubFetcher::with_counts(10, 12, 15));
    let transport = Arc::new(StubTransport::completion("PERSONA"));

    let report = pipeline(&config, &fetcher, &transport)
        .run("spez", "m", Some("sk-test"))
        .await
        .unwrap();

    assert!(report.document.truncated);
    assert_eq!(report.document.total_chars, 500);
    assert!(report.document.text.ends_with("\n[... truncated ...]"));
}

#[tokio::test]
async fn test_username_is_percent_encoded() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let fetcher = Arc::new(StubFetcher::failing());
    let transport = Arc::new(StubTransport::completion("PERSONA"));

    let report = pipeline(&config, &fetcher, &transport)
        .run("a b/c", "m", Some("sk-test"))
        .await
        .unwrap();

    assert_eq!(fetcher.requested()[0], "https://www.reddit.com/user/a%20b%2Fc/");
    assert!(report.writes.written[0].ends_with("persona_a_b_c.txt"));
}
