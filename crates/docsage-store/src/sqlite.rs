//! SQLite-backed vector store: append-only records with int8 embeddings and
//! cosine search over an in-memory normalized matrix.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::embedding::{normalized, QuantizedEmbedding};
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use docsage_core::{Error, IdStrategy, Metadata, Result};

const DB_FILE: &str = "docsage.db";

/// One named collection of a SQLite vector store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    collection: String,
    embedding_dim: usize,
    id_strategy: IdStrategy,
    /// Normalized embeddings for search: (N, dim) float32.
    embedding_matrix: Mutex<EmbeddingMatrix>,
}

struct EmbeddingMatrix {
    matrix: Array2<f32>,
    /// Record IDs corresponding to each row.
    record_ids: Vec<String>,
    /// Whether the matrix needs reloading from disk.
    dirty: bool,
}

impl SqliteStore {
    /// Open or create the store at `db_dir/docsage.db` and bind it to
    /// `collection`. An existing collection must have the same dimension.
    pub fn open(
        db_dir: impl AsRef<Path>,
        collection: &str,
        embedding_dim: usize,
        id_strategy: IdStrategy,
    ) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(DB_FILE);

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Self::ensure_collection(&conn, collection, embedding_dim)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            collection: collection.to_string(),
            embedding_dim,
            id_strategy,
            embedding_matrix: Mutex::new(EmbeddingMatrix {
                matrix: Array2::zeros((0, embedding_dim)),
                record_ids: Vec::new(),
                dirty: true,
            }),
        };

        store.load_embedding_matrix()?;

        info!(
            "SqliteStore opened: collection={}, {} records, dim={}, path={}",
            store.collection,
            store.count()?,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn ensure_collection(conn: &Connection, name: &str, embedding_dim: usize) -> Result<()> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT embedding_dim FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        match existing {
            Some(dim) if dim as usize != embedding_dim => Err(Error::Config(format!(
                "Collection '{}' stores {}-dim embeddings, embedder produces {}",
                name, dim, embedding_dim
            ))),
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO collections (name, embedding_dim, created_at) VALUES (?1, ?2, ?3)",
                    params![name, embedding_dim as i64, now_millis()],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                info!("Created collection '{}' (dim={})", name, embedding_dim);
                Ok(())
            }
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of records in this collection.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        Self::count_with(&conn, &self.collection)
    }

    fn count_with(conn: &Connection, collection: &str) -> Result<usize> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count as usize)
    }

    // ---------------------------------------------------------------
    // Append
    // ---------------------------------------------------------------

    /// Append a batch of records and return their assigned IDs.
    ///
    /// Sequential IDs are derived from the collection size read inside the
    /// same transaction as the inserts. An empty batch is a no-op.
    pub fn add_records(&self, records: &[NewRecord]) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        if let Some((i, r)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.embedding.len() != self.embedding_dim)
        {
            return Err(Error::Inference(format!(
                "Record {} has a {}-dim embedding, collection '{}' expects {}",
                i,
                r.embedding.len(),
                self.collection,
                self.embedding_dim
            )));
        }

        let now = now_millis();
        let mut quantized = Vec::with_capacity(records.len());
        let ids;
        {
            let mut conn = self.conn.lock();
            let tx = conn
                .transaction()
                .map_err(|e| Error::Database(e.to_string()))?;

            ids = match self.id_strategy {
                IdStrategy::Sequential => {
                    let existing = Self::count_with(&tx, &self.collection)?;
                    (0..records.len())
                        .map(|i| (existing + i).to_string())
                        .collect::<Vec<_>>()
                }
                IdStrategy::Random => records
                    .iter()
                    .map(|_| uuid::Uuid::new_v4().to_string())
                    .collect(),
            };

            {
                let mut stmt = tx
                    .prepare_cached(
                        "INSERT INTO records (collection, id, text, metadata_json, embedding, \
                         scale, offset_val, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .map_err(|e| Error::Database(e.to_string()))?;

                for (id, record) in ids.iter().zip(records) {
                    let q = QuantizedEmbedding::quantize(&record.embedding);
                    let meta_json = serde_json::to_string(&record.metadata)?;
                    stmt.execute(params![
                        self.collection,
                        id,
                        record.text,
                        meta_json,
                        q.bytes,
                        q.scale as f64,
                        q.offset as f64,
                        now,
                    ])
                    .map_err(|e| {
                        if e.to_string().contains("UNIQUE constraint") {
                            Error::Storage(format!("Duplicate record id '{}' in '{}'", id, self.collection))
                        } else {
                            Error::Database(e.to_string())
                        }
                    })?;
                    quantized.push(q);
                }
            }

            tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        }

        self.append_to_matrix(&ids, &quantized);
        debug!("Appended {} records to '{}'", ids.len(), self.collection);
        Ok(ids)
    }

    /// Extend the in-memory matrix with freshly stored rows. A dirty matrix is
    /// left alone; its next reload picks the rows up from disk. The rows are
    /// already committed, so an append failure only marks the matrix dirty.
    fn append_to_matrix(&self, ids: &[String], quantized: &[QuantizedEmbedding]) {
        let mut mat = self.embedding_matrix.lock();
        if mat.dirty {
            return;
        }
        for (id, q) in ids.iter().zip(quantized) {
            let Some(row) = normalized(&q.dequantize()) else {
                warn!("Record {} has a zero embedding; it will never match", id);
                continue;
            };
            if let Err(e) = mat.matrix.push(Axis(0), row.view()) {
                warn!("Matrix append failed, reloading on next search: {}", e);
                mat.dirty = true;
                return;
            }
            mat.record_ids.push(id.clone());
        }
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn get_record(&self, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, text, metadata_json, created_at FROM records \
                 WHERE collection = ?1 AND id = ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let record = stmt
            .query_row(params![self.collection, id], Self::row_to_record)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(record)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let meta_json: String = row.get("metadata_json")?;
        let metadata = serde_json::from_str::<Metadata>(&meta_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Record {
            id: row.get("id")?,
            text: row.get("text")?,
            metadata,
            created_at: row.get("created_at")?,
        })
    }

    // ---------------------------------------------------------------
    // Vector Search
    // ---------------------------------------------------------------

    fn load_embedding_matrix(&self) -> Result<()> {
        let mut record_ids = Vec::new();
        let mut rows: Vec<Array1<f32>> = Vec::new();

        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, embedding, scale, offset_val FROM records \
                     WHERE collection = ?1 ORDER BY seq",
                )
                .map_err(|e| Error::Database(e.to_string()))?;

            let stored = stmt
                .query_map(params![self.collection], |row| {
                    let id: String = row.get(0)?;
                    let bytes: Vec<u8> = row.get(1)?;
                    let scale: f64 = row.get(2)?;
                    let offset: f64 = row.get(3)?;
                    Ok((
                        id,
                        QuantizedEmbedding {
                            bytes,
                            scale: scale as f32,
                            offset: offset as f32,
                        },
                    ))
                })
                .map_err(|e| Error::Database(e.to_string()))?;

            for entry in stored {
                let (id, q) = entry.map_err(|e| Error::Database(e.to_string()))?;
                if q.dimension() != self.embedding_dim {
                    warn!("Skipping record {} with {}-dim embedding", id, q.dimension());
                    continue;
                }
                if let Some(row) = normalized(&q.dequantize()) {
                    record_ids.push(id);
                    rows.push(row);
                }
            }
        }

        let mut matrix = Array2::zeros((rows.len(), self.embedding_dim));
        for (i, row) in rows.iter().enumerate() {
            matrix.row_mut(i).assign(row);
        }

        let mut mat = self.embedding_matrix.lock();
        mat.matrix = matrix;
        mat.record_ids = record_ids;
        mat.dirty = false;
        debug!("Loaded {} embeddings into matrix", mat.record_ids.len());
        Ok(())
    }

    fn ensure_matrix_loaded(&self) -> Result<()> {
        if self.embedding_matrix.lock().dirty {
            self.load_embedding_matrix()?;
        }
        Ok(())
    }

    /// Up to `top_k` records by descending cosine similarity.
    pub fn vector_search(&self, query_embedding: &Array1<f32>, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if query_embedding.len() != self.embedding_dim {
            return Err(Error::Inference(format!(
                "Query embedding has {} dims, collection '{}' expects {}",
                query_embedding.len(),
                self.collection,
                self.embedding_dim
            )));
        }
        self.ensure_matrix_loaded()?;

        let Some(q) = normalized(query_embedding) else {
            return Ok(Vec::new());
        };

        let top: Vec<(String, f64)> = {
            let mat = self.embedding_matrix.lock();
            if mat.matrix.nrows() == 0 {
                return Ok(Vec::new());
            }

            // (N, dim) @ (dim,) → (N,)
            let similarities = mat.matrix.dot(&q);
            let mut indexed: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
            // Stable sort keeps insertion order among ties
            indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            indexed.truncate(top_k);
            indexed
                .into_iter()
                .map(|(i, s)| (mat.record_ids[i].clone(), s as f64))
                .collect()
        };

        let mut hits = Vec::with_capacity(top.len());
        for (id, score) in top {
            if let Some(record) = self.get_record(&id)? {
                hits.push(SearchHit {
                    id: record.id,
                    text: record.text,
                    metadata: record.metadata,
                    score,
                });
            }
        }
        Ok(hits)
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total = self.count()?;
        let db_size = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);
        let mat = self.embedding_matrix.lock();

        Ok(StoreStats {
            collection: self.collection.clone(),
            total_records: total as i64,
            embedding_dimension: self.embedding_dim,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
            matrix_loaded: !mat.dirty,
            matrix_rows: mat.matrix.nrows(),
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_core::MetadataValue;
    use ndarray::array;
    use tempfile::TempDir;

    fn test_store(dim: usize) -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), "test", dim, IdStrategy::Sequential).unwrap();
        (store, dir)
    }

    fn record(text: &str, embedding: Array1<f32>) -> NewRecord {
        let mut metadata = Metadata::new();
        metadata.insert("page".into(), MetadataValue::Int(1));
        NewRecord {
            text: text.into(),
            metadata,
            embedding,
        }
    }

    #[test]
    fn test_sequential_ids_continue_across_batches() {
        let (store, _dir) = test_store(3);
        let ids = store
            .add_records(&[
                record("one", array![1.0, 0.0, 0.0]),
                record("two", array![0.0, 1.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(ids, vec!["0", "1"]);

        let ids = store.add_records(&[record("three", array![0.0, 0.0, 1.0])]).unwrap();
        assert_eq!(ids, vec!["2"]);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_random_ids_are_unique() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), "test", 2, IdStrategy::Random).unwrap();
        let ids = store
            .add_records(&[record("a", array![1.0, 0.0]), record("b", array![0.0, 1.0])])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(uuid::Uuid::parse_str(&ids[0]).is_ok());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (store, _dir) = test_store(3);
        assert!(store.add_records(&[]).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_dimension_mismatch_writes_nothing() {
        let (store, _dir) = test_store(3);
        let err = store
            .add_records(&[record("ok", array![1.0, 0.0, 0.0]), record("bad", array![1.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_vector_search_ordering() {
        let (store, _dir) = test_store(3);
        store
            .add_records(&[
                record("rust", array![1.0, 0.5, 0.0]),
                record("python", array![0.1, 0.0, 1.0]),
                record("go", array![0.5, 1.0, 0.0]),
            ])
            .unwrap();

        let hits = store.vector_search(&array![1.0, 0.3, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "rust");
        assert_eq!(hits[1].text, "go");
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].metadata["page"], MetadataValue::Int(1));
    }

    #[test]
    fn test_search_empty_store_and_zero_k() {
        let (store, _dir) = test_store(2);
        assert!(store.vector_search(&array![1.0, 0.0], 5).unwrap().is_empty());

        store.add_records(&[record("a", array![1.0, 0.0])]).unwrap();
        assert!(store.vector_search(&array![1.0, 0.0], 0).unwrap().is_empty());
        assert!(store.vector_search(&array![1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path(), "docs", 2, IdStrategy::Sequential).unwrap();
            store
                .add_records(&[record("left", array![1.0, 0.0]), record("up", array![0.0, 1.0])])
                .unwrap();
        }

        let store = SqliteStore::open(dir.path(), "docs", 2, IdStrategy::Sequential).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        let hits = store.vector_search(&array![0.1, 1.0], 1).unwrap();
        assert_eq!(hits[0].id, "1");
        assert_eq!(store.add_records(&[record("right", array![-1.0, 0.0])]).unwrap(), vec!["2"]);
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() {
        let dir = TempDir::new().unwrap();
        SqliteStore::open(dir.path(), "docs", 384, IdStrategy::Sequential).unwrap();
        let err = SqliteStore::open(dir.path(), "docs", 768, IdStrategy::Sequential)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let a = SqliteStore::open(dir.path(), "a", 2, IdStrategy::Sequential).unwrap();
        let b = SqliteStore::open(dir.path(), "b", 2, IdStrategy::Sequential).unwrap();

        a.add_records(&[record("x", array![1.0, 0.0])]).unwrap();
        assert_eq!(b.add_records(&[record("y", array![0.0, 1.0])]).unwrap(), vec!["0"]);
        assert_eq!(a.count().unwrap(), 1);
        assert_eq!(b.count().unwrap(), 1);
        assert_eq!(b.vector_search(&array![1.0, 0.0], 5).unwrap()[0].text, "y");
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = test_store(2);
        store.add_records(&[record("a", array![1.0, 0.0])]).unwrap();

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.matrix_rows, 1);
        assert!(stats.matrix_loaded);
        assert_eq!(stats.embedding_dimension, 2);
        assert!(stats.db_path.ends_with("docsage.db"));
    }

    #[test]
    fn test_get_record_round_trips_metadata() {
        let (store, _dir) = test_store(2);
        let mut r = record("chart", array![0.0, 1.0]);
        r.metadata.insert("page".into(), MetadataValue::Int(3));
        let ids = store.add_records(&[r]).unwrap();

        let found = store.get_record(&ids[0]).unwrap().unwrap();
        assert_eq!(found.text, "chart");
        assert_eq!(found.metadata["page"], MetadataValue::Int(3));
        assert!(store.get_record("missing").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_metadata_is_an_error() {
        let (store, _dir) = test_store(2);
        store.add_records(&[record("a", array![1.0, 0.0])]).unwrap();
        store
            .conn
            .lock()
            .execute("UPDATE records SET metadata_json = '{not json'", [])
            .unwrap();

        assert!(matches!(store.get_record("0"), Err(Error::Database(_))));
        assert!(matches!(
            store.vector_search(&array![1.0, 0.0], 1),
            Err(Error::Database(_))
        ));
    }
}
