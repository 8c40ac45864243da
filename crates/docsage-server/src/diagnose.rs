//! Environment diagnostics: embedding model, vector store, API credentials.

use std::sync::Arc;

use docsage_chat::LLMConfig;
use docsage_core::DocSageConfig;
use docsage_infer::{embed_required, EmbedderBackend};
use docsage_store::VectorIndex;

/// Result of a diagnostics run.
#[derive(Debug)]
pub struct DiagnosticReport {
    pub data_dir: String,
    pub embedder_model: String,
    pub embedding_dim: Option<usize>,
    pub store_path: Option<String>,
    pub collection: String,
    pub records: usize,
    pub llm_provider: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl DiagnosticReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check everything ingestion and queries depend on.
pub fn run(config: &DocSageConfig, embedder: Arc<dyn EmbedderBackend>) -> DiagnosticReport {
    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
    run_with(config, embedder, &llm_config)
}

pub fn run_with(
    config: &DocSageConfig,
    embedder: Arc<dyn EmbedderBackend>,
    llm_config: &LLMConfig,
) -> DiagnosticReport {
    let mut report = DiagnosticReport {
        data_dir: config.data_paths.root.display().to_string(),
        embedder_model: embedder.model_name().to_string(),
        embedding_dim: None,
        store_path: None,
        collection: config.collection.clone(),
        records: 0,
        llm_provider: None,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    // Embedding model
    match embed_required(embedder.as_ref(), "test") {
        Ok(v) => {
            report.embedding_dim = Some(v.len());
            if v.len() != config.embedding_dim {
                report.warnings.push(format!(
                    "Embedding dimension {} differs from configured {}",
                    v.len(),
                    config.embedding_dim
                ));
            }
        }
        Err(e) => report.errors.push(format!(
            "Embedding model failed: {} (expected model files in {})",
            e,
            config.data_paths.models.display()
        )),
    }

    // Vector store
    match VectorIndex::open(
        &config.data_paths.vectordb,
        &config.collection,
        embedder,
        config.id_strategy,
    ) {
        Ok(index) => match index.stats() {
            Ok(stats) => {
                report.records = stats.total_records as usize;
                report.store_path = Some(stats.db_path);
                if report.records == 0 {
                    report.warnings.push("Index is empty; ingest a PDF first".into());
                }
            }
            Err(e) => report.errors.push(format!("Failed to read store: {}", e)),
        },
        Err(e) => report.errors.push(format!("Failed to open store: {}", e)),
    }

    // Credentials
    match llm_config.require_provider() {
        Ok(resolved) => {
            report.llm_provider = Some(format!("{} ({})", resolved.provider, resolved.model));
        }
        Err(e) => report.errors.push(e.to_string()),
    }

    report
}

pub fn print_report(report: &DiagnosticReport) {
    println!("=== DocSage Diagnostics ===");
    println!();
    println!("Data directory:     {}", report.data_dir);
    println!("Embedding model:    {}", report.embedder_model);
    println!(
        "Embedding dim:      {}",
        report.embedding_dim.map(|d| d.to_string()).unwrap_or_else(|| "unavailable".into())
    );
    println!("Store:              {}", report.store_path.as_deref().unwrap_or("unavailable"));
    println!("Collection:         {}", report.collection);
    println!("Records:            {}", report.records);
    println!("LLM provider:       {}", report.llm_provider.as_deref().unwrap_or("not configured"));

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &report.warnings {
            println!("  - {}", w);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &report.errors {
            println!("  - {}", e);
        }
    }

    println!();
    if report.is_healthy() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
}
