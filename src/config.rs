//! TOML configuration with built-in defaults.
//!
//! Every parameter is resolved once at load time; components receive an
//! immutable [`RagConfig`] value at construction and never consult global
//! state afterwards. A missing config file falls back to the defaults.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::RagError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RagConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted vector index. Its existence is the
    /// signal for "reuse instead of rebuild" during ingestion.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("db/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Separator priority list. The splitter falls through this list and
    /// finally splits between any two characters.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_separators() -> Vec<String> {
    vec![
        "\n\nChapter".to_string(),
        "\n\n".to_string(),
        "\n".to_string(),
        " ".to_string(),
        String::new(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Search mode; only "similarity" is supported.
    #[serde(default = "default_search_mode")]
    pub search_mode: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            search_mode: default_search_mode(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_search_mode() -> String {
    "similarity".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding provider: "openai" or "hash" (deterministic, offline).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Chat provider: "openai" or "echo" (offline, answers with the question).
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Custom system prompt template; must contain `{context}`.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_chat_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            system_prompt: None,
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f64 {
    0.3
}

/// Load configuration from a TOML file and validate it.
pub fn load_config(path: &Path) -> Result<RagConfig, RagError> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))
        .map_err(|e| RagError::Configuration(format!("{:#}", e)))?;

    let config: RagConfig = toml::from_str(&content)
        .map_err(|e| RagError::Configuration(format!("failed to parse config file: {}", e)))?;

    validate(&config)?;
    Ok(config)
}

/// Load the config file if it exists, otherwise use built-in defaults.
pub fn load_or_default(path: &Path) -> Result<RagConfig, RagError> {
    if path.exists() {
        load_config(path)
    } else {
        let config = RagConfig::default();
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &RagConfig) -> Result<(), RagError> {
    if config.chunking.chunk_size == 0 {
        return Err(RagError::Configuration(
            "chunking.chunk_size must be > 0".to_string(),
        ));
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        return Err(RagError::Configuration(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
            config.chunking.chunk_overlap, config.chunking.chunk_size
        )));
    }
    if config.retrieval.top_k == 0 {
        return Err(RagError::Configuration(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }
    if config.retrieval.search_mode != "similarity" {
        return Err(RagError::Configuration(format!(
            "unknown search mode: '{}' (only 'similarity' is supported)",
            config.retrieval.search_mode
        )));
    }
    match config.embedding.provider.as_str() {
        "openai" | "hash" => {}
        other => {
            return Err(RagError::Configuration(format!(
                "unknown embedding provider: '{}' (use openai or hash)",
                other
            )))
        }
    }
    if config.embedding.dims == 0 {
        return Err(RagError::Configuration(
            "embedding.dims must be > 0".to_string(),
        ));
    }
    match config.generation.provider.as_str() {
        "openai" | "echo" => {}
        other => {
            return Err(RagError::Configuration(format!(
                "unknown generation provider: '{}' (use openai or echo)",
                other
            )))
        }
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        return Err(RagError::Configuration(
            "generation.temperature must be in [0.0, 2.0]".to_string(),
        ));
    }
    if let Some(prompt) = &config.generation.system_prompt {
        if !prompt.contains("{context}") {
            return Err(RagError::Configuration(
                "generation.system_prompt must contain a {context} placeholder".to_string(),
            ));
        }
    }
    Ok(())
}
