//! Chat types: providers, conversation history, and the HTTP API surface.

use serde::{Deserialize, Serialize};

use docsage_core::RetrievedDocument;

/// Hosted LLM provider. Both speak the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Groq,
    OpenAI,
}

impl LLMProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LLMProvider::Groq => "https://api.groq.com/openai/v1",
            LLMProvider::OpenAI => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the session conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Append-only history for one interactive session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed question/answer exchange.
    pub fn push_exchange(&mut self, question: &str, answer: &str) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: question.to_string(),
        });
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: answer.to_string(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Incoming chat request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Chat response: the answer and the context it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<RetrievedDocument>,
}

/// LLM config response (keys masked).
#[derive(Debug, Clone, Serialize)]
pub struct LLMConfigResponse {
    #[serde(rename = "preferredProvider")]
    pub preferred_provider: String,
    #[serde(rename = "openaiConfigured")]
    pub openai_configured: bool,
    #[serde(rename = "groqConfigured")]
    pub groq_configured: bool,
    #[serde(rename = "openaiModel")]
    pub openai_model: String,
    #[serde(rename = "groqModel")]
    pub groq_model: String,
    #[serde(rename = "openaiVisionModel")]
    pub openai_vision_model: String,
    #[serde(rename = "groqVisionModel")]
    pub groq_vision_model: String,
    #[serde(rename = "activeProvider")]
    pub active_provider: Option<String>,
    #[serde(rename = "availableModels")]
    pub available_models: Vec<String>,
}

/// LLM config update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LLMConfigUpdate {
    #[serde(rename = "preferredProvider")]
    pub preferred_provider: Option<String>,
    #[serde(rename = "openaiApiKey")]
    pub openai_api_key: Option<String>,
    #[serde(rename = "groqApiKey")]
    pub groq_api_key: Option<String>,
    #[serde(rename = "openaiModel")]
    pub openai_model: Option<String>,
    #[serde(rename = "groqModel")]
    pub groq_model: Option<String>,
    #[serde(rename = "openaiVisionModel")]
    pub openai_vision_model: Option<String>,
    #[serde(rename = "groqVisionModel")]
    pub groq_vision_model: Option<String>,
}
