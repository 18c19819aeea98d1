//! Completion backend client
//!
//! The loop only needs "messages in, text out". `OllamaClient` speaks the
//! Ollama chat API with a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const FALLBACK_MODEL: &str = "llama3";

/// Sampling options sent with every completion call
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
}

impl Default for SamplingOptions {
    /// Temperature is pinned to zero so the model sticks to the textual tool protocol.
    fn default() -> Self {
        Self { temperature: 0.0 }
    }
}

/// Trait for the text-generation service the loop calls each iteration
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier sent with each request
    fn model(&self) -> &str;

    async fn complete(&self, messages: &[Message], options: &SamplingOptions) -> Result<String>;
}

/// Reusable Ollama chat client (connection-pooled)
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Pick the model currently loaded in the backend, else the first
    /// installed one, else `FALLBACK_MODEL`.
    pub async fn discover_model(base_url: &str) -> String {
        let base_url = base_url.trim_end_matches('/');
        let client = match Client::builder().timeout(Duration::from_secs(2)).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Model discovery unavailable: {}", e);
                return FALLBACK_MODEL.to_string();
            }
        };

        for path in ["/api/ps", "/api/tags"] {
            match list_models(&client, &format!("{}{}", base_url, path)).await {
                Ok(Some(name)) => {
                    info!(model = %name, endpoint = path, "Model discovered");
                    return name;
                }
                Ok(None) => debug!(endpoint = path, "No models listed"),
                Err(e) => debug!(endpoint = path, "Model listing failed: {}", e),
            }
        }

        warn!("No model discovered, falling back to {}", FALLBACK_MODEL);
        FALLBACK_MODEL.to_string()
    }
}

async fn list_models(client: &Client, url: &str) -> Result<Option<String>> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Ok(None);
    }
    let listing: ModelListing = response.json().await?;
    Ok(listing.models.into_iter().next().map(|m| m.name))
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message], options: &SamplingOptions) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: *options,
        };

        debug!(model = %self.model, messages = messages.len(), "Calling completion backend");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                AgentError::Backend(format!("request to {} failed: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Completion backend returned {}: {}", status, error_text);
            return Err(AgentError::Backend(format!("{}: {}", status, error_text)));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            AgentError::Backend(format!("unreadable response: {}", e))
        })?;

        Ok(chat.message.content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[allow(dead_code)]
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}
