//! Record and statistics types for the vector index.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use docsage_core::Metadata;

/// A record to be appended: text, cleaned metadata, and its embedding.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Array1<f32>,
}

/// A stored record (embedding omitted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub created_at: i64,
}

/// A nearest-neighbour hit before it is turned into a retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity.
    pub score: f64,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub collection: String,
    pub total_records: i64,
    pub embedding_dimension: usize,
    pub db_path: String,
    pub db_size_mb: f64,
    pub matrix_loaded: bool,
    pub matrix_rows: usize,
}
