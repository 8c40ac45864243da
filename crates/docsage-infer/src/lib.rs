//! DocSage Infer: embedding backend and query cache.
//!
//! With the `onnx` feature and model files present, `OnnxEmbedder` produces
//! 384-dim all-MiniLM-L6-v2 embeddings. Otherwise `NoopEmbedder` is used and
//! indexing reports the model as unavailable.

pub mod cache;
pub mod embedder;
pub mod hashing;
pub mod onnx_embedder;

pub use cache::{CacheStats, QueryCache};
pub use embedder::{embed_all_required, embed_required, EmbedderBackend, EmbeddingResult, NoopEmbedder};
pub use hashing::HashingEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available embedder for the given model directory.
pub fn create_embedder(model_dir: &Path, dim: usize) -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) => {
                tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!("ONNX embedder unavailable: {}", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::warn!("ONNX feature disabled; indexing and search are unavailable");
    }

    Arc::new(NoopEmbedder::new(dim))
}
