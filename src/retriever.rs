//! Query-configuration wrapper around an opened index.

use std::str::FromStr;

use crate::config::RetrievalConfig;
use crate::error::RagError;
use crate::index::IndexHandle;
use crate::models::Chunk;

/// How retrieval ranks candidates. Only plain similarity search is
/// implemented; the enum keeps the config surface honest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Similarity,
}

impl FromStr for SearchMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "similarity" => Ok(SearchMode::Similarity),
            other => Err(RagError::Configuration(format!(
                "unknown search mode: '{}' (only 'similarity' is supported)",
                other
            ))),
        }
    }
}

/// Retrieves chunks from an index with a fixed search mode and result count.
#[derive(Debug)]
pub struct Retriever {
    handle: IndexHandle,
    search_mode: SearchMode,
    top_k: usize,
}

impl Retriever {
    pub fn new(handle: IndexHandle, config: &RetrievalConfig) -> Result<Self, RagError> {
        if config.top_k == 0 {
            return Err(RagError::Configuration("top_k must be >= 1".to_string()));
        }
        Ok(Self {
            handle,
            search_mode: config.search_mode.parse()?,
            top_k: config.top_k,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the most relevant chunks for `query`, using `k_override`
    /// in place of the configured count when given.
    pub async fn retrieve(
        &self,
        query: &str,
        k_override: Option<usize>,
    ) -> Result<Vec<Chunk>, RagError> {
        let k = k_override.unwrap_or(self.top_k);
        match self.search_mode {
            SearchMode::Similarity => self.handle.query(query, k).await,
        }
    }
}
