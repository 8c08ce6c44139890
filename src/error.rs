//! Error taxonomy for the ingestion pipeline.
//!
//! One variant per failure class the orchestrator distinguishes. "No
//! extractable text" is deliberately absent: a document that normalizes to
//! nothing is a skip, not an error, and is classified in `ingest`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("download failed: {0}")]
    Download(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("ocr failed: {0}")]
    Ocr(String),

    #[error("no chunks generated")]
    NoChunks,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Store(e.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
