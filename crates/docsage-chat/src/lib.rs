//! Retrieval-augmented question answering over the vector index.
//!
//! Image descriptions and answers come from hosted OpenAI-compatible chat
//! completion APIs (Groq or OpenAI); no local generation model is required.

pub mod config;
pub mod engine;
pub mod prompt;
pub mod providers;
pub mod types;

pub use config::{LLMConfig, ResolvedProvider};
pub use engine::{Answer, QueryEngine, NO_CONTEXT_MESSAGE};
pub use providers::{ChatCompletionClient, HostedAnswerGenerator, HostedVisionDescriber};
pub use types::*;
