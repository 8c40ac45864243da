//! Hosted model capabilities.
//!
//! The pipeline only talks to remote models through these two traits, so
//! tests can substitute deterministic fakes for network clients.

use async_trait::async_trait;

use crate::Result;

/// Produces a natural-language description of an image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe encoded image bytes (`mime_type` such as `image/png`).
    async fn describe_image(&self, image: &[u8], mime_type: &str) -> Result<String>;
}

/// Generates an answer from a system instruction and a user question.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_answer(&self, system_prompt: &str, question: &str) -> Result<String>;
}
