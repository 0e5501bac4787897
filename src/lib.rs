//! persona-builder
//!
//! Scrapes a Reddit user's public profile, posts and comments into a
//! budgeted document, asks a chat-completion model for a persona and saves
//! the answer as text and markdown.

pub mod aggregator;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod logging;
pub mod markup;
pub mod pipeline;
pub mod prompt;
pub mod source;
pub mod version;
pub mod writer;

pub use error::{Error, Result};
