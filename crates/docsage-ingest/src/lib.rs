//! DocSage Ingest: PDF content extraction and the ingestion pipeline.

pub mod decode;
pub mod ingest;
pub mod pdf;

#[cfg(test)]
mod testing;

pub use decode::{decode_pdf_image, DecodedImage, MIN_IMAGE_DIMENSION};
pub use ingest::{IngestReport, Ingester};
pub use pdf::{IngestOptions, PdfExtractor};
