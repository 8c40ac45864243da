//! Retrieval-augmented query engine.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::prompt::{build_context, system_prompt};
use docsage_core::config::DEFAULT_TOP_K;
use docsage_core::{AnswerGenerator, Result, RetrievedDocument};
use docsage_store::VectorIndex;

/// Returned without calling the model when retrieval finds nothing.
pub const NO_CONTEXT_MESSAGE: &str = "No relevant context found in the database.";

/// A generated answer with the context it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedDocument>,
}

/// Retrieve → build context → generate.
pub struct QueryEngine<'a> {
    index: &'a VectorIndex,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a VectorIndex, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            index,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let sources = self.index.search(question, self.top_k)?;
        if sources.is_empty() {
            debug!("No context for question, skipping generation");
            return Ok(Answer {
                text: NO_CONTEXT_MESSAGE.to_string(),
                sources,
            });
        }

        let context = build_context(&sources);
        let text = self
            .generator
            .generate_answer(&system_prompt(&context), question)
            .await?;

        info!("Answered question with {} context entries", sources.len());
        Ok(Answer { text, sources })
    }
}
