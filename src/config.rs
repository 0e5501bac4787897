//! Configuration system for persona-builder
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (`OPENROUTER_API_KEY`, `PERSONA_*`), including a `.env` file
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::markup::{CandidateSelector, DEFAULT_CANDIDATE_SELECTOR};
use crate::prompt::DEFAULT_TEMPLATE;
use crate::source::{SourceBudget, SourceTag};

/// Browser-like agent sent with every page fetch
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";

/// Model used when neither the CLI nor the config names one
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Source page fetching
    pub scraper: ScraperSettings,

    /// Per-source budgets
    pub budgets: BudgetSettings,

    /// Aggregated document limits
    pub document: DocumentSettings,

    /// Generation API settings
    pub api: ApiSettings,

    /// Instruction template
    pub prompt: PromptSettings,

    /// Output files
    pub output: OutputSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Source page fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Site root the user pages live under
    pub base_url: String,

    /// `User-Agent` header sent with each fetch
    pub user_agent: String,

    /// CSS selector for per-item containers
    pub selector: String,

    /// Page fetch timeout in seconds
    pub timeout_secs: u64,
}

/// Budgets for the three sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    pub profile: SourceBudget,
    pub posts: SourceBudget,
    pub comments: SourceBudget,
}

impl BudgetSettings {
    pub fn for_tag(&self, tag: SourceTag) -> &SourceBudget {
        match tag {
            SourceTag::Profile => &self.profile,
            SourceTag::Posts => &self.posts,
            SourceTag::Comments => &self.comments,
        }
    }
}

/// Aggregated document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Maximum length of the aggregated document in characters
    pub global_char_ceiling: usize,

    /// Appended when the ceiling cuts the document
    pub truncation_marker: String,
}

/// Chat-completion API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Full chat-completions URL
    pub endpoint: String,

    /// Bearer token; normally supplied through `OPENROUTER_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier used when `--model` is absent
    pub default_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum output tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// System role message
    pub system_prompt: String,

    /// Sent as `HTTP-Referer`
    pub referer: String,

    /// Sent as `X-Title`
    pub title: String,
}

/// Prompt template settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Instruction template with `{username}` and `{text}` placeholders
    pub template: String,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory persona files are written to
    pub dir: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of daily log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            selector: DEFAULT_CANDIDATE_SELECTOR.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            profile: SourceTag::Profile.default_budget(),
            posts: SourceTag::Posts.default_budget(),
            comments: SourceTag::Comments.default_budget(),
        }
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            global_char_ceiling: 12_000,
            truncation_marker: "\n[... truncated ...]".to_string(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            max_tokens: 2000,
            temperature: 0.7,
            system_prompt: "You're an expert in user behavior profiling.".to_string(),
            referer: "http://localhost:3000".to_string(),
            title: "RedditPersonaBuilder".to_string(),
        }
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: "out".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides()?;

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("persona-builder.toml"),
            dirs::config_dir()
                .map(|p| p.join("persona-builder").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".persona-builder.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("OPENROUTER_API_KEY") {
            self.api.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONA_MODEL") {
            self.api.default_model = val;
        }
        if let Ok(val) = std::env::var("PERSONA_API_ENDPOINT") {
            self.api.endpoint = val;
        }
        if let Ok(val) = std::env::var("PERSONA_API_TIMEOUT_SECS") {
            self.api.timeout_secs = val.parse().map_err(|_| {
                Error::config_field_invalid(
                    "api.timeout_secs",
                    format!("PERSONA_API_TIMEOUT_SECS must be a whole number of seconds, got '{}'", val),
                )
            })?;
        }

        if let Ok(val) = std::env::var("PERSONA_BASE_URL") {
            self.scraper.base_url = val;
        }
        if let Ok(val) = std::env::var("PERSONA_USER_AGENT") {
            self.scraper.user_agent = val;
        }

        if let Ok(val) = std::env::var("PERSONA_OUTPUT_DIR") {
            self.output.dir = val;
        }

        if let Ok(val) = std::env::var("PERSONA_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PERSONA_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONA_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }

        Ok(())
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.output.dir = expand_path(&self.output.dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_url("scraper.base_url", &self.scraper.base_url)?;
        validate_url("api.endpoint", &self.api.endpoint)?;

        if self.scraper.user_agent.trim().is_empty() {
            return Err(Error::config_field_invalid("scraper.user_agent", "User agent cannot be empty"));
        }
        CandidateSelector::parse(&self.scraper.selector)?;

        if self.scraper.timeout_secs == 0 || self.api.timeout_secs == 0 {
            return Err(Error::config_validation("Timeouts must be greater than 0 seconds"));
        }

        for tag in SourceTag::ALL {
            self.budgets.for_tag(tag).validate(tag)?;
        }

        let marker_len = self.document.truncation_marker.chars().count();
        if self.document.global_char_ceiling <= marker_len {
            return Err(Error::config_field_invalid(
                "document.global_char_ceiling",
                "global_char_ceiling must be longer than the truncation marker",
            ));
        }

        if self.api.default_model.trim().is_empty() {
            return Err(Error::config_field_invalid("api.default_model", "Model cannot be empty"));
        }
        if !(0.0..=2.0).contains(&self.api.temperature) {
            return Err(Error::config_field_invalid(
                "api.temperature",
                "temperature must be between 0.0 and 2.0",
            ));
        }
        if self.api.max_tokens == 0 {
            return Err(Error::config_field_invalid("api.max_tokens", "max_tokens must be greater than 0"));
        }

        if self.output.dir.trim().is_empty() {
            return Err(Error::config_field_invalid("output.dir", "Output directory cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// API key if present and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    /// Get the output directory as a PathBuf
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.dir)
    }

    /// Copy with the API key masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api.api_key.is_some() {
            copy.api.api_key = Some("********".to_string());
        }
        copy
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::config_field_invalid(field, format!("Invalid URL '{}': {}", value, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::config_field_invalid(
            field,
            format!("URL '{}' must start with http:// or https://", value),
        ));
    }
    Ok(())
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| PathBuf::from("persona-builder.toml"));

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    format!(
        r#"# persona-builder configuration
#
# The API key is read from OPENROUTER_API_KEY (a .env file works too).

[scraper]
# Site the user pages are read from
base_url = "https://www.reddit.com"

# User-Agent sent with every page fetch
user_agent = "{user_agent}"

# CSS selector matching one item on a user listing page
selector = "{selector}"

# Page fetch timeout in seconds
timeout_secs = 30

# Per-source budgets (lengths are characters)
[budgets.profile]
min_fragment_chars = 30
max_fragments = 8
max_fragment_chars = 300
max_source_chars = 2500

[budgets.posts]
min_fragment_chars = 50
max_fragments = 10
max_fragment_chars = 400
max_source_chars = 4000

[budgets.comments]
min_fragment_chars = 30
max_fragments = 15
max_fragment_chars = 300
max_source_chars = 4000

[document]
# Ceiling for the aggregated text sent to the model
global_char_ceiling = 12000
truncation_marker = "\n[... truncated ...]"

[api]
endpoint = "https://openrouter.ai/api/v1/chat/completions"
default_model = "{model}"
timeout_secs = 60
max_tokens = 2000
temperature = 0.7
system_prompt = "You're an expert in user behavior profiling."
referer = "http://localhost:3000"
title = "RedditPersonaBuilder"

# [prompt]
# Instruction template; {{username}} and {{text}} are substituted.
# template = """..."""

[output]
dir = "out"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.persona-builder/logs/persona.log"

# Daily log files to keep
max_files = 5
json_format = false
"#,
        user_agent = DEFAULT_USER_AGENT,
        selector = DEFAULT_CANDIDATE_SELECTOR,
        model = DEFAULT_MODEL,
    )
}
