//! Error taxonomy shared across the pipeline.
//!
//! Every library operation returns [`RagError`]; the CLI boundary converts
//! to an exit code and prints a remediation hint. Per-file failures during
//! directory ingestion are carried as values inside a load report instead
//! of propagating (see [`crate::loader::LoadReport`]).

use thiserror::Error;

/// Errors produced by the ingestion and retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing file, directory, or persisted index.
    #[error("not found: {0}")]
    NotFound(String),

    /// File extension outside the supported set.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration or missing required credential.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Text extraction from a document file failed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The embedding service failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The language model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Query attempted before the pipeline reached the ready state.
    #[error("pipeline not initialized: {0}")]
    NotInitialized(String),

    /// The index storage location could not be created, written, or read.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RagError {
    /// One-line hint printed under the error message at the CLI boundary.
    pub fn remediation(&self) -> &'static str {
        match self {
            RagError::NotFound(_) => {
                "Check the path, or ingest documents first: rag ingest --file <path>"
            }
            RagError::UnsupportedFormat(_) => {
                "Supported file types: .pdf, .txt, .md, .docx, .doc"
            }
            RagError::Configuration(_) => {
                "Review the config file and environment (e.g. OPENAI_API_KEY)"
            }
            RagError::Extraction(_) => "The file may be corrupt or password-protected",
            RagError::Embedding(_) => "Check the embedding provider settings and network",
            RagError::Generation(_) => "Check the chat model settings and network",
            RagError::NotInitialized(_) => {
                "Run `rag ingest` before querying, or point [index] path at an existing index"
            }
            RagError::Persistence(_) => "Check that the index location is writable",
        }
    }
}

impl From<sqlx::Error> for RagError {
    fn from(e: sqlx::Error) -> Self {
        RagError::Persistence(e.to_string())
    }
}

impl From<std::io::Error> for RagError {
    fn from(e: std::io::Error) -> Self {
        RagError::Persistence(e.to_string())
    }
}
