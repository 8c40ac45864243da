//! Vector index: embeds content units and answers similarity queries.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::sqlite::SqliteStore;
use crate::types::{NewRecord, StoreStats};
use docsage_core::{coerce_metadata, ContentUnit, Error, IdStrategy, Result, RetrievedDocument};
use docsage_infer::{embed_all_required, embed_required, EmbedderBackend};

/// A persistent collection plus the embedder that feeds it.
///
/// Indexing and querying must go through the same embedder; the collection
/// records its dimension and refuses to open with a different one.
pub struct VectorIndex {
    store: SqliteStore,
    embedder: Arc<dyn EmbedderBackend>,
}

impl VectorIndex {
    /// Open (or create) `collection` under `db_dir`.
    pub fn open(
        db_dir: impl AsRef<Path>,
        collection: &str,
        embedder: Arc<dyn EmbedderBackend>,
        id_strategy: IdStrategy,
    ) -> Result<Self> {
        let store = SqliteStore::open(db_dir, collection, embedder.dimension(), id_strategy)?;
        Ok(Self { store, embedder })
    }

    pub fn embedder(&self) -> &Arc<dyn EmbedderBackend> {
        &self.embedder
    }

    /// Embed and append units, returning the new record IDs in input order.
    ///
    /// Nothing is written unless every unit embeds successfully.
    pub fn add(&self, units: &[ContentUnit]) -> Result<Vec<String>> {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = units.iter().map(|u| u.content.as_str()).collect();
        let embeddings = embed_all_required(self.embedder.as_ref(), &texts)?;

        let records: Vec<NewRecord> = units
            .iter()
            .zip(embeddings)
            .map(|(unit, embedding)| NewRecord {
                text: unit.content.clone(),
                metadata: coerce_metadata(&unit.metadata),
                embedding,
            })
            .collect();

        let ids = self.store.add_records(&records)?;
        info!(
            "Indexed {} units into '{}' ({} total)",
            ids.len(),
            self.store.collection(),
            self.store.count()?
        );
        Ok(ids)
    }

    /// The `k` most similar entries, best first. Fewer when the index is small.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        if k == 0 || self.store.count()? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = embed_required(self.embedder.as_ref(), query)?;
        if query_embedding.len() != self.store.embedding_dim() {
            return Err(Error::Inference(format!(
                "Embedder produced {} dims, index expects {}",
                query_embedding.len(),
                self.store.embedding_dim()
            )));
        }

        let hits = self.store.vector_search(&query_embedding, k)?;
        debug!("Search '{}' → {} hits", query, hits.len());

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RetrievedDocument {
                id: hit.id,
                text: hit.text,
                metadata: hit.metadata,
                rank: i + 1,
                distance: 1.0 - hit.score,
                score: hit.score,
            })
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.get_stats()
    }
}
