//! Language-model service seam
//!
//! The engine talks to the generative model through `LlmService` only:
//! `invoke` for a full completion, `stream` for incremental chunks. A
//! failure here is the one genuinely fatal condition for a turn — there is
//! no corpus-only fallback for the generative step.

mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM stream interrupted: {0}")]
    Stream(String),

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
}

/// Message role in the chat protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message sent to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Finite, consumed-once sequence of generated text chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Abstraction over the language-model service
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Generate a full completion for the message sequence
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Generate a completion as an ordered chunk stream
    async fn stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError>;
}
