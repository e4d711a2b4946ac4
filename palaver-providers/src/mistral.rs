//! Mistral chat-completions HTTP client

use async_trait::async_trait;
use palaver_core::config::ProviderConfig;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::base::{CompletionProvider, ProviderError, ProviderResult, WireMessage};

const DEFAULT_API_BASE: &str = "https://api.mistral.ai/v1";

/// Conversational openers prepended to successful replies
const REPLY_OPENERS: [&str; 7] = [
    "Sure, here's what I found:",
    "That's a great question!",
    "Let me break it down for you:",
    "Here's an insightful take on that:",
    "Let's explore this together:",
    "Certainly!",
    "Absolutely, here's what I can tell you:",
];

/// Chat-completions request format
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
}

/// Chat-completions response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Mistral provider client. One HTTP request per turn, full context out,
/// one text completion back, bounded by a hard client timeout.
pub struct MistralClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl MistralClient {
    /// Create a new Mistral client
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Self {
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base,
            api_key,
            model,
        }
    }

    /// Build a client from the provider section of the config
    pub fn from_config(config: &ProviderConfig) -> Self {
        let api_key = if config.api_key.trim().is_empty() {
            None
        } else {
            Some(config.api_key.clone())
        };
        Self::new(
            api_key,
            Some(config.api_base.clone()),
            config.model.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn decorate(reply: &str) -> String {
        let opener = REPLY_OPENERS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(REPLY_OPENERS[0]);
        format!("{opener}\n{reply}")
    }
}

#[async_trait]
impl CompletionProvider for MistralClient {
    async fn complete(&self, messages: Vec<WireMessage>) -> ProviderResult<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
        };

        debug!(
            api_base = %self.api_base,
            model = %self.model,
            turns = request.messages.len(),
            "sending completion request"
        );

        let url = format!("{}/chat/completions", self.api_base);
        let mut req_builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let body = response.text().await?;
        let data: ChatCompletionResponse = serde_json::from_str(&body)?;
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no completion in response".to_string())
            })?;

        Ok(Self::decorate(&content))
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }
}
