//! Common test utilities and fixtures
//!
//! Stub collaborators standing in for the network during pipeline tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use persona_builder::client::{ChatCompletionRequest, ChatTransport, RawResponse};
use persona_builder::error::{Error, Result};
use persona_builder::fetch::PageFetcher;
use persona_builder::source::SourceTag;

/// Map a fetched URL back to the source it belongs to
pub fn tag_of(url: &str) -> SourceTag {
    if url.ends_with("/submitted/") {
        SourceTag::Posts
    } else if url.ends_with("/comments/") {
        SourceTag::Comments
    } else {
        SourceTag::Profile
    }
}

/// Listing page with one candidate element per text
pub fn listing_page(texts: &[String]) -> String {
    let items: String = texts
        .iter()
        .map(|t| format!(r#"<div class="subgrid-container"><p>{}</p></div>"#, t))
        .collect();
    format!("<html><head><title>u</title></head><body>{}</body></html>", items)
}

/// `count` distinct candidates of roughly 60 characters
pub fn candidates(tag: SourceTag, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{} item {:02} with enough words to pass every minimum.", tag, i))
        .collect()
}

/// Serves a fixed page per source, or fails every fetch
pub struct StubFetcher {
    pages: Option<[String; 3]>,
    pub requested: Mutex<Vec<String>>,
}

impl StubFetcher {
    /// Pages with the given candidate counts for profile, posts and comments
    pub fn with_counts(profile: usize, posts: usize, comments: usize) -> Self {
        Self {
            pages: Some([
                listing_page(&candidates(SourceTag::Profile, profile)),
                listing_page(&candidates(SourceTag::Posts, posts)),
                listing_page(&candidates(SourceTag::Comments, comments)),
            ]),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            pages: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        let pages = self
            .pages
            .as_ref()
            .ok_or_else(|| Error::fetch(url, "connection refused"))?;
        let index = SourceTag::ALL
            .iter()
            .position(|t| *t == tag_of(url))
            .unwrap_or(0);
        Ok(pages[index].clone())
    }
}

/// Answers every request with a fixed status and body
pub struct StubTransport {
    status: u16,
    body: String,
    pub requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl StubTransport {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Successful completion whose first choice is `content`
    pub fn completion(content: &str) -> Self {
        let body = serde_json::json!({
            "id": "gen-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        });
        Self::new(200, body.to_string())
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for StubTransport {
    async fn post(&self, _api_key: &str, request: &ChatCompletionRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(RawResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}
