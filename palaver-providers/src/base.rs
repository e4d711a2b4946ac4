//! Base trait for completion providers

use async_trait::async_trait;
use palaver_core::model::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A role-tagged message as carried on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Trait for completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send the full conversation context and get one completion back.
    /// The whole sequence goes out on every call so replies stay
    /// context-aware.
    async fn complete(&self, messages: Vec<WireMessage>) -> ProviderResult<String>;

    /// The model identifier this provider sends by default
    fn default_model(&self) -> String;
}
