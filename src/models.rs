//! Core data types flowing through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use serde_json::Value;

/// Scalar metadata attached to documents and chunks.
pub type Metadata = BTreeMap<String, Value>;

/// A loaded document: raw text plus loader-supplied metadata.
///
/// Immutable once created; documents live only for the duration of a single
/// ingestion call.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// A bounded-length excerpt of a source document.
///
/// `content` is a contiguous substring of the source document's content and
/// `start_index` is the byte offset of its first character there (chunks are
/// cut only at char boundaries). `metadata` is inherited from the source
/// document unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub start_index: usize,
    pub metadata: Metadata,
}
