//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default collection name for the vector index.
pub const DEFAULT_COLLECTION: &str = "rag_collection";

/// Default number of documents retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Paths to all DocSage data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Vector index directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Embedding model files (`data/models/`).
    pub models: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            models: root.join("models"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.vectordb)?;
        std::fs::create_dir_all(&self.models)?;
        Ok(())
    }
}

/// How the vector index assigns identifiers to new records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Collection size before the batch plus the offset within the batch.
    /// Only unique with a single writer.
    #[default]
    Sequential,
    /// Random UUID v4 strings.
    Random,
}

impl FromStr for IdStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "random" | "uuid" => Ok(Self::Random),
            other => Err(crate::Error::Config(format!("Unknown id strategy: {}", other))),
        }
    }
}

/// Top-level DocSage configuration, passed explicitly to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSageConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (384 for all-MiniLM-L6-v2).
    pub embedding_dim: usize,
    /// Name of the single vector index collection.
    pub collection: String,
    /// Identifier assignment for new index records.
    pub id_strategy: IdStrategy,
    /// Number of documents retrieved per question.
    pub top_k: usize,
    /// Drop image units whose description failed instead of indexing the
    /// error text.
    pub skip_failed_descriptions: bool,
}

impl DocSageConfig {
    /// Create configuration from defaults rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            port: 3003,
            data_paths: DataPaths::new(data_dir)?,
            embedding_dim: 384,
            collection: DEFAULT_COLLECTION.to_string(),
            id_strategy: IdStrategy::Sequential,
            top_k: DEFAULT_TOP_K,
            skip_failed_descriptions: false,
        })
    }

    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> crate::Result<Self> {
        let mut config = Self::new(data_dir)?;

        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Ok(collection) = std::env::var("DOCSAGE_COLLECTION") {
            if !collection.trim().is_empty() {
                config.collection = collection.trim().to_string();
            }
        }
        if let Ok(strategy) = std::env::var("DOCSAGE_ID_STRATEGY") {
            config.id_strategy = strategy.parse()?;
        }
        if let Some(k) = std::env::var("DOCSAGE_TOP_K").ok().and_then(|k| k.parse().ok()) {
            config.top_k = k;
        }
        if let Ok(skip) = std::env::var("DOCSAGE_SKIP_FAILED_DESCRIPTIONS") {
            config.skip_failed_descriptions = matches!(skip.trim(), "1" | "true" | "yes");
        }

        tracing::debug!(
            "Configuration: collection={}, id_strategy={:?}, top_k={}",
            config.collection,
            config.id_strategy,
            config.top_k
        );
        Ok(config)
    }
}
