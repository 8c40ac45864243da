//! Error types for DocSage.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot open document: {0}")]
    DocumentOpen(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Hosted model error: {0}")]
    HostedModel(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
