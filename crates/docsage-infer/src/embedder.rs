//! Embedding backend trait.
//!
//! The same backend must embed both indexed content and queries; vectors from
//! different models are not comparable.

use ndarray::Array1;

use crate::cache::CacheStats;
use docsage_core::{Error, Result};

/// Result of an embedding operation.
pub struct EmbeddingResult {
    /// Float32 embedding vector (384-dim for all-MiniLM-L6-v2).
    pub embedding: Array1<f32>,
}

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    /// Returns None if the embedder is not available or inference failed.
    fn embed(&self, text: &str) -> Option<EmbeddingResult>;

    /// Generate embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<EmbeddingResult>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Check if the embedder is available (model loaded).
    fn is_available(&self) -> bool;

    /// Human-readable model identifier, used in diagnostics.
    fn model_name(&self) -> &str;

    /// Query cache counters, for backends that cache.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// Embed one text or fail with an inference error.
pub fn embed_required(embedder: &dyn EmbedderBackend, text: &str) -> Result<Array1<f32>> {
    if !embedder.is_available() {
        return Err(Error::Inference("embedding model unavailable".into()));
    }
    embedder
        .embed(text)
        .map(|r| r.embedding)
        .ok_or_else(|| Error::Inference("embedding failed".into()))
}

/// Embed every text or fail on the first missing vector.
pub fn embed_all_required(embedder: &dyn EmbedderBackend, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
    if !embedder.is_available() {
        return Err(Error::Inference("embedding model unavailable".into()));
    }
    embedder
        .embed_batch(texts)
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            r.map(|r| r.embedding)
                .ok_or_else(|| Error::Inference(format!("embedding failed for input {}", i)))
        })
        .collect()
}

/// Placeholder embedder used when no model is installed.
pub struct NoopEmbedder {
    dim: usize,
}

impl NoopEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl EmbedderBackend for NoopEmbedder {
    fn embed(&self, _text: &str) -> Option<EmbeddingResult> {
        None
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "none"
    }
}
