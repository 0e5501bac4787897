//! Chat-completion client for persona generation
//!
//! Sends the composed prompt to an OpenAI-compatible endpoint (OpenRouter
//! by default) and classifies the answer into a [`PersonaResult`]. One
//! attempt per run, no retries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ApiSettings;
use crate::error::{Error, Result};
use crate::prompt::Prompt;

// ─────────────────────────────────────────────────────────────────
// API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Status and body of an HTTP answer, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ─────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────

/// Delivers one chat-completion request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// POST `request` once. `Err` means no HTTP answer was obtained.
    async fn post(&self, api_key: &str, request: &ChatCompletionRequest) -> Result<RawResponse>;
}

/// `ChatTransport` over HTTP
pub struct HttpChatTransport {
    client: Client,
    endpoint: String,
    referer: String,
    title: String,
    timeout_secs: u64,
}

impl HttpChatTransport {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            referer: settings.referer.clone(),
            title: settings.title.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn post(&self, api_key: &str, request: &ChatCompletionRequest) -> Result<RawResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::request(format!("timed out after {}s", self.timeout_secs))
                } else {
                    Error::request(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::request(format!("failed to read response body: {}", e)))?;

        Ok(RawResponse { status, body })
    }
}

// ─────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────

/// Tagged result of the generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonaResult {
    /// Persona text returned by the model
    Ok(String),
    /// Non-success HTTP status
    HttpError { status: u16, body: String },
    /// Transport failure or unusable success body
    RequestError(String),
    /// Missing credential; no request was made
    ConfigError(String),
}

impl PersonaResult {
    /// Extra diagnostic for statuses with a known cause.
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            PersonaResult::HttpError { status: 402, .. } => Some("token or payment limit reached"),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<String> {
        match self {
            PersonaResult::Ok(text) => Ok(text),
            PersonaResult::HttpError { status, body } => Err(Error::ApiStatus { status, body }),
            PersonaResult::RequestError(message) => Err(Error::Request { message }),
            PersonaResult::ConfigError(_) => Err(Error::MissingApiKey),
        }
    }
}

impl fmt::Display for PersonaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaResult::Ok(text) => write!(f, "OK ({} chars)", text.chars().count()),
            PersonaResult::HttpError { status, body } => {
                write!(f, "HTTP error {}: {}", status, body)?;
                if let Some(note) = self.annotation() {
                    write!(f, " ({})", note)?;
                }
                Ok(())
            }
            PersonaResult::RequestError(detail) => write!(f, "Request error: {}", detail),
            PersonaResult::ConfigError(detail) => write!(f, "Configuration error: {}", detail),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────

/// Builds the chat request and classifies the answer.
pub struct PersonaClient {
    transport: Arc<dyn ChatTransport>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl PersonaClient {
    pub fn new(transport: Arc<dyn ChatTransport>, settings: &ApiSettings) -> Self {
        Self {
            transport,
            system_prompt: settings.system_prompt.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    pub fn build_request(&self, prompt: &Prompt, model_id: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model_id.to_string(),
            messages: vec![
                ChatMessage::new("system", self.system_prompt.clone()),
                ChatMessage::new("user", prompt.as_str()),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Send `prompt` to `model_id`.
    ///
    /// A missing or blank key returns `ConfigError` before the transport is
    /// touched.
    pub async fn request(&self, prompt: &Prompt, model_id: &str, api_key: Option<&str>) -> PersonaResult {
        let api_key = match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => {
                return PersonaResult::ConfigError(
                    "OPENROUTER_API_KEY not found in environment variables".to_string(),
                )
            }
        };

        let request = self.build_request(prompt, model_id);
        info!(model = %model_id, prompt_chars = prompt.char_len(), "Requesting persona from model");

        let response = match self.transport.post(api_key, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e.format_for_log(), "Generation request failed");
                return PersonaResult::RequestError(e.to_string());
            }
        };

        let outcome = classify(response);
        match &outcome {
            PersonaResult::Ok(text) => debug!(chars = text.chars().count(), "Persona received"),
            other => warn!(outcome = %other, "Generation API returned an error"),
        }
        outcome
    }
}

/// Map an HTTP answer to an outcome.
fn classify(response: RawResponse) -> PersonaResult {
    if !response.is_success() {
        return PersonaResult::HttpError {
            status: response.status,
            body: response.body,
        };
    }

    let parsed: ChatCompletionResponse = match serde_json::from_str(&response.body) {
        Ok(parsed) => parsed,
        Err(e) => return PersonaResult::RequestError(format!("Failed to parse API response: {}", e)),
    };

    match parsed.choices.into_iter().next() {
        None => PersonaResult::RequestError("Failed to parse API response: no choices".to_string()),
        Some(choice) => match choice.message.content {
            Some(content) if !content.trim().is_empty() => PersonaResult::Ok(content),
            _ => PersonaResult::RequestError(
                "Failed to parse API response: first choice has no content".to_string(),
            ),
        },
    }
}
