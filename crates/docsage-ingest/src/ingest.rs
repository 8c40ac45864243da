//! Ingestion pipeline: PDF → content units → vector index.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::pdf::PdfExtractor;
use docsage_core::{ContentKind, ContentUnit, Result};
use docsage_store::VectorIndex;

/// Summary of one ingested document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub units: usize,
    pub text_units: usize,
    pub image_units: usize,
    pub ids: Vec<String>,
}

impl IngestReport {
    fn new(source: &str, units: &[ContentUnit], ids: Vec<String>) -> Self {
        let text_units = units.iter().filter(|u| u.kind == ContentKind::Text).count();
        Self {
            source: source.to_string(),
            units: units.len(),
            text_units,
            image_units: units.len() - text_units,
            ids,
        }
    }
}

/// Extracts a document and indexes everything it yields.
pub struct Ingester<'a> {
    extractor: &'a PdfExtractor,
    index: &'a VectorIndex,
}

impl<'a> Ingester<'a> {
    pub fn new(extractor: &'a PdfExtractor, index: &'a VectorIndex) -> Self {
        Self { extractor, index }
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let units = self.extractor.extract(path).await?;
        self.store(&path.display().to_string(), units)
    }

    pub async fn ingest_bytes(&self, bytes: &[u8], source: &str) -> Result<IngestReport> {
        let units = self.extractor.extract_bytes(bytes, source).await?;
        self.store(source, units)
    }

    fn store(&self, source: &str, units: Vec<ContentUnit>) -> Result<IngestReport> {
        let ids = self.index.add(&units)?;
        let report = IngestReport::new(source, &units, ids);
        info!(
            "Ingested {}: {} units ({} text, {} images), index now holds {}",
            source,
            report.units,
            report.text_units,
            report.image_units,
            self.index.count()?
        );
        Ok(report)
    }
}
