//! Hosted model clients over the OpenAI-compatible chat-completions API.
//!
//! Groq and OpenAI share the request format; only the base URL differs.
//! Requests are single-shot and non-streaming, with no retry.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{LLMConfig, ResolvedProvider};
use docsage_core::{AnswerGenerator, Error, ImageDescriber, Result};

/// Instruction sent with every image.
pub const VISION_PROMPT: &str =
    "Describe this image in detail. If it contains a table or chart, summarize the data.";

/// Sampling temperature for grounded answers.
pub const ANSWER_TEMPERATURE: f64 = 0.1;

/// Minimal chat-completions client.
#[derive(Clone)]
pub struct ChatCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ChatCompletionClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn for_provider(resolved: &ResolvedProvider) -> Self {
        Self::new(&resolved.base_url, &resolved.api_key)
    }

    /// Send one completion request and return the first choice's text.
    pub async fn complete(&self, model: &str, messages: Value, temperature: Option<f64>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if let Some(t) = temperature {
            body["temperature"] = json!(t);
        }

        debug!("Requesting completion from {} with model {}", url, model);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::HostedModel(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HostedModel(format!("API error {}: {}", status, body)));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| Error::HostedModel(format!("Invalid response body: {}", e)))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::HostedModel("Response has no message content".into()))
    }
}

/// Vision describer backed by a hosted multimodal model.
pub struct HostedVisionDescriber {
    client: ChatCompletionClient,
    model: String,
}

impl HostedVisionDescriber {
    pub fn new(client: ChatCompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Fails with `MissingCredential` when no API key is configured.
    pub fn from_config(config: &LLMConfig) -> Result<Self> {
        let resolved = config.require_provider()?;
        Ok(Self::new(
            ChatCompletionClient::for_provider(&resolved),
            resolved.vision_model,
        ))
    }
}

#[async_trait]
impl ImageDescriber for HostedVisionDescriber {
    async fn describe_image(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let messages = json!([{
            "role": "user",
            "content": [
                {"type": "text", "text": VISION_PROMPT},
                {
                    "type": "image_url",
                    "image_url": {"url": format!("data:{};base64,{}", mime_type, encoded)},
                },
            ],
        }]);
        self.client.complete(&self.model, messages, None).await
    }
}

/// Answer generator backed by a hosted chat model.
pub struct HostedAnswerGenerator {
    client: ChatCompletionClient,
    model: String,
}

impl HostedAnswerGenerator {
    pub fn new(client: ChatCompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Fails with `MissingCredential` when no API key is configured.
    pub fn from_config(config: &LLMConfig) -> Result<Self> {
        let resolved = config.require_provider()?;
        Ok(Self::new(
            ChatCompletionClient::for_provider(&resolved),
            resolved.model,
        ))
    }
}

#[async_trait]
impl AnswerGenerator for HostedAnswerGenerator {
    async fn generate_answer(&self, system_prompt: &str, question: &str) -> Result<String> {
        let messages = json!([
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": question},
        ]);
        self.client
            .complete(&self.model, messages, Some(ANSWER_TEMPERATURE))
            .await
    }
}
