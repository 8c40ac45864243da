//! Status route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// GET /api/status: index size, embedder and LLM availability.
async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<serde_json::Value> {
    let stats = state.index.stats()?;
    let embedder = state.index.embedder();
    let provider = state
        .llm_config
        .read()
        .resolve_provider()
        .map(|r| r.provider.to_string());

    Ok(Json(serde_json::json!({
        "collection": stats.collection,
        "records": stats.total_records,
        "embeddingDimension": stats.embedding_dimension,
        "dbSizeMb": stats.db_size_mb,
        "embedder": {
            "available": embedder.is_available(),
            "model": embedder.model_name(),
            "queryCache": embedder.cache_stats().map(|c| serde_json::json!({
                "hits": c.hits,
                "misses": c.misses,
                "entries": c.entries,
            })),
        },
        "llmAvailable": provider.is_some(),
        "llmProvider": provider,
        "conversationTurns": state.conversation.read().len(),
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::routes::test_support::*;
    use crate::state::AppState;
    use axum::http::StatusCode;
    use docsage_core::{ContentUnit, DocSageConfig};
    use docsage_infer::{CacheStats, EmbedderBackend, EmbeddingResult, HashingEmbedder, QueryCache};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reports_index() {
        let (state, _dir) = test_state();
        state
            .index
            .add(&[ContentUnit::text("a.pdf", 1, "hello world")])
            .unwrap();

        let (status, body) = send(&state, get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"], 1);
        assert_eq!(body["collection"], "rag_collection");
        assert_eq!(body["embedder"]["available"], true);
        assert_eq!(body["llmAvailable"], false);
        assert!(body["embedder"]["queryCache"].is_null());
    }

    /// Hashing embedder behind a query cache.
    struct CachedHashing {
        inner: HashingEmbedder,
        cache: QueryCache,
    }

    impl EmbedderBackend for CachedHashing {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            if let Some(embedding) = self.cache.get(text) {
                return Some(EmbeddingResult { embedding });
            }
            let result = self.inner.embed(text)?;
            self.cache.put(text.to_string(), result.embedding.clone());
            Some(result)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "cached-hashing"
        }

        fn cache_stats(&self) -> Option<CacheStats> {
            Some(self.cache.stats())
        }
    }

    #[tokio::test]
    async fn test_status_reports_query_cache() {
        let dir = TempDir::new().unwrap();
        let config = DocSageConfig::new(dir.path()).unwrap();
        let embedder = CachedHashing {
            inner: HashingEmbedder::new(384),
            cache: QueryCache::default_cache(),
        };
        let state = Arc::new(AppState::new(config, Arc::new(embedder)).unwrap());
        state.index.add(&[ContentUnit::text("a.pdf", 1, "quarterly revenue")]).unwrap();
        state.index.search("quarterly revenue", 1).unwrap();

        let (_, body) = send(&state, get("/api/status")).await;
        let cache = &body["embedder"]["queryCache"];
        assert_eq!(cache["hits"], 1);
        assert_eq!(cache["misses"], 1);
        assert_eq!(cache["entries"], 1);
    }
}
