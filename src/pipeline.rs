//! End-to-end persona run
//!
//! Stages run strictly in order: credential check, aggregation, prompt
//! composition, generation, file output. Any failure before output aborts
//! the run without writing files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregator::{AggregatedDocument, Aggregator};
use crate::client::{ChatTransport, HttpChatTransport, PersonaClient};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::extractor::FragmentExtractor;
use crate::fetch::{HttpPageFetcher, PageFetcher};
use crate::markup::CandidateSelector;
use crate::prompt::PromptComposer;
use crate::writer::{ResultWriter, WriteReport};

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub document: AggregatedDocument,
    pub prompt_chars: usize,
    pub persona: String,
    pub writes: WriteReport,
}

/// Wires the stage components for one user.
pub struct PersonaPipeline {
    aggregator: Aggregator,
    composer: PromptComposer,
    client: PersonaClient,
    writer: ResultWriter,
    document_dump: Option<PathBuf>,
}

impl PersonaPipeline {
    pub fn new(
        aggregator: Aggregator,
        composer: PromptComposer,
        client: PersonaClient,
        writer: ResultWriter,
    ) -> Self {
        Self {
            aggregator,
            composer,
            client,
            writer,
            document_dump: None,
        }
    }

    /// Build the pipeline with HTTP collaborators from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpPageFetcher::new(&config.scraper)?);
        let transport = Arc::new(HttpChatTransport::new(&config.api)?);
        Self::with_collaborators(config, fetcher, transport)
    }

    /// Build the pipeline around the given fetcher and transport.
    pub fn with_collaborators(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self> {
        let selector = CandidateSelector::parse(&config.scraper.selector)?;
        let extractor = FragmentExtractor::new(fetcher, selector);
        let aggregator = Aggregator::new(
            extractor,
            config.scraper.base_url.clone(),
            config.budgets.clone(),
            config.document.clone(),
        );

        Ok(Self::new(
            aggregator,
            PromptComposer::new(config.prompt.template.clone()),
            PersonaClient::new(transport, &config.api),
            ResultWriter::new(config.output_dir()),
        ))
    }

    /// Also write the aggregated document to `path` before generation.
    pub fn with_document_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_dump = Some(path.into());
        self
    }

    /// Run all stages for `username` against `model_id`.
    ///
    /// The key is checked before any page is fetched.
    pub async fn run(&self, username: &str, model_id: &str, api_key: Option<&str>) -> Result<RunReport> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Config("Username cannot be empty".to_string()));
        }
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(Error::MissingApiKey)?;

        let document = self.aggregator.aggregate(username).await;
        for warning in &document.warnings {
            warn!(username = %username, "{}", warning);
        }
        if document.is_empty() {
            warn!(username = %username, "No text extracted from any source");
        }

        if let Some(path) = &self.document_dump {
            dump_document(path, &document).await;
        }

        let prompt = self.composer.compose(username, &document);
        let prompt_chars = prompt.char_len();
        info!(prompt_chars, "Prompt composed");

        let persona = self
            .client
            .request(&prompt, model_id, Some(api_key))
            .await
            .into_result()?;

        let writes = self.writer.write(username, &persona).await?;

        Ok(RunReport {
            document,
            prompt_chars,
            persona,
            writes,
        })
    }
}

async fn dump_document(path: &Path, document: &AggregatedDocument) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %e, "Failed to create document dump directory");
            return;
        }
    }

    match tokio::fs::write(path, &document.text).await {
        Ok(()) => info!(path = %path.display(), chars = document.total_chars, "Aggregated document saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save aggregated document"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatCompletionRequest, RawResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingFetcher(AtomicUsize);

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(r#"<div class="subgrid-container">A comment long enough to be kept by every budget. Really.</div>"#.to_string())
        }
    }

    struct FixedTransport(u16, &'static str);

    #[async_trait]
    impl ChatTransport for FixedTransport {
        async fn post(&self, _: &str, _: &ChatCompletionRequest) -> Result<RawResponse> {
            Ok(RawResponse { status: self.0, body: self.1.to_string() })
        }
    }

    fn pipeline(dir: &Path, status: u16, body: &'static str) -> (PersonaPipeline, Arc<CountingFetcher>) {
        let mut config = AppConfig::default();
        config.output.dir = dir.join("out").to_string_lossy().into_owned();
        let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));
        let pipeline = PersonaPipeline::with_collaborators(
            &config,
            fetcher.clone(),
            Arc::new(FixedTransport(status, body)),
        )
        .unwrap();
        (pipeline, fetcher)
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_fetching() {
        let temp = TempDir::new().unwrap();
        let (pipeline, fetcher) = pipeline(temp.path(), 200, "{}");

        let err = pipeline.run("spez", "m", None).await.unwrap_err();

        assert!(matches!(err, Error::MissingApiKey));
        assert_eq!(fetcher.0.load(Ordering::SeqCst), 0);
        assert!(!temp.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_blank_username_rejected() {
        let temp = TempDir::new().unwrap();
        let (pipeline, fetcher) = pipeline(temp.path(), 200, "{}");

        assert!(pipeline.run("  ", "m", Some("sk")).await.is_err());
        assert_eq!(fetcher.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_run_writes_files_and_dump() {
        let temp = TempDir::new().unwrap();
        let (pipeline, fetcher) = pipeline(
            temp.path(),
            200,
            r#"{"choices":[{"message":{"content":"PERSONA"}}]}"#,
        );
        let dump = temp.path().join("debug/document.txt");
        let pipeline = pipeline.with_document_dump(&dump);

        let report = pipeline.run("spez", "m", Some("sk")).await.unwrap();

        assert_eq!(fetcher.0.load(Ordering::SeqCst), 3);
        assert_eq!(report.persona, "PERSONA");
        assert_eq!(report.document.sections.len(), 3);
        assert!(report.prompt_chars > report.document.total_chars);
        assert!(report.writes.is_complete());
        assert_eq!(std::fs::read_to_string(&dump).unwrap(), report.document.text);
    }

    #[tokio::test]
    async fn test_api_error_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let (pipeline, _) = pipeline(temp.path(), 500, "upstream down");

        let err = pipeline.run("spez", "m", Some("sk")).await.unwrap_err();

        assert!(matches!(err, Error::ApiStatus { status: 500, .. }));
        assert!(!temp.path().join("out").exists());
    }
}
