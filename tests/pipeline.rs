//! End-to-end pipeline tests with offline providers.
//!
//! Everything runs in process against a temporary index directory using the
//! deterministic hash embedder and scripted chat models, so no network or
//! credentials are involved.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use ragpipe::config::RagConfig;
use ragpipe::embedding::{Embedder, HashEmbedder};
use ragpipe::error::RagError;
use ragpipe::generator::ChatModel;
use ragpipe::loader::IngestSource;
use ragpipe::pipeline::Pipeline;

/// Wraps the hash embedder and counts how many texts get embedded, so tests
/// can assert that reuse paths embed nothing.
struct CountingEmbedder {
    inner: HashEmbedder,
    calls: Arc<AtomicUsize>,
}

impl CountingEmbedder {
    fn new(dims: usize) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner: HashEmbedder::new(dims),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

struct FixedChat(&'static str);

#[async_trait]
impl ChatModel for FixedChat {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, RagError> {
        Ok(self.0.to_string())
    }
}

fn test_config(index_dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.index.path = index_dir.to_path_buf();
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = 32;
    config.generation.provider = "echo".to_string();
    config
}

fn offline_pipeline(config: RagConfig) -> (Pipeline, Arc<AtomicUsize>) {
    let (embedder, calls) = CountingEmbedder::new(config.embedding.dims);
    let pipeline =
        Pipeline::with_components(config, Arc::new(embedder), Box::new(FixedChat("the answer")))
            .unwrap();
    (pipeline, calls)
}

fn write_doc(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn short_document_becomes_a_single_chunk() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "short.txt", "A short note, well under one chunk.");
    let (mut pipeline, _) = offline_pipeline(test_config(&tmp.path().join("index")));

    let summary = pipeline
        .ingest(&IngestSource::File(doc), false)
        .await
        .unwrap();

    assert!(!summary.reused);
    assert_eq!(summary.documents_loaded, 1);
    assert_eq!(summary.chunks_indexed, 1);
    assert!(pipeline.is_ready());
}

#[tokio::test]
async fn long_document_splits_into_many_chunks() {
    let tmp = TempDir::new().unwrap();
    let body = "The quick brown fox jumps over the lazy dog. ".repeat(250);
    let doc = write_doc(tmp.path(), "long.txt", &body);
    let (mut pipeline, _) = offline_pipeline(test_config(&tmp.path().join("index")));

    let summary = pipeline
        .ingest(&IngestSource::File(doc), false)
        .await
        .unwrap();

    assert!(summary.chunks_indexed > 1);
}

#[tokio::test]
async fn query_returns_answer_and_requested_sources() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir(&docs).unwrap();
    write_doc(&docs, "a.txt", "Document about apples and orchards.");
    write_doc(&docs, "b.txt", "Document about bridges and rivers.");
    write_doc(&docs, "c.txt", "Document about compilers and parsing.");
    write_doc(&docs, "d.txt", "Document about deserts and dunes.");

    let mut config = test_config(&tmp.path().join("index"));
    config.retrieval.top_k = 3;
    let (mut pipeline, _) = offline_pipeline(config);

    let source = IngestSource::Directory {
        path: docs,
        file_types: None,
        recursive: true,
    };
    pipeline.ingest(&source, false).await.unwrap();

    let (answer, sources) = pipeline.query("apples", true).await.unwrap();
    assert_eq!(answer, "the answer");
    assert_eq!(sources.unwrap().len(), 3);

    let (_, no_sources) = pipeline.query("apples", false).await.unwrap();
    assert!(no_sources.is_none());
}

#[tokio::test]
async fn load_existing_on_empty_location_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let (mut pipeline, _) = offline_pipeline(test_config(&tmp.path().join("index")));

    let err = pipeline.load_existing_index().await.unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
    assert!(!pipeline.is_ready());
}

#[tokio::test]
async fn query_before_ingest_is_not_initialized() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, _) = offline_pipeline(test_config(&tmp.path().join("index")));

    let err = pipeline.query("anything", false).await.unwrap_err();
    assert!(matches!(err, RagError::NotInitialized(_)));
}

#[tokio::test]
async fn second_ingest_reuses_the_index_without_embedding() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "doc.txt", "Reusable document body.");
    let config = test_config(&tmp.path().join("index"));

    let (mut pipeline, calls) = offline_pipeline(config.clone());
    let first = pipeline
        .ingest(&IngestSource::File(doc.clone()), false)
        .await
        .unwrap();
    assert!(!first.reused);
    let embedded = calls.load(Ordering::SeqCst);
    assert!(embedded > 0);

    // A fresh pipeline against the same location reuses the store.
    let (mut pipeline, calls) = offline_pipeline(config);
    let second = pipeline.ingest(&IngestSource::File(doc), false).await.unwrap();
    assert!(second.reused);
    assert_eq!(second.chunks_indexed, first.chunks_indexed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(pipeline.is_ready());
}

#[tokio::test]
async fn force_recreate_rebuilds_and_re_embeds() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "doc.txt", "Document to be re-indexed.");
    let config = test_config(&tmp.path().join("index"));

    let (mut pipeline, _) = offline_pipeline(config.clone());
    pipeline
        .ingest(&IngestSource::File(doc.clone()), false)
        .await
        .unwrap();

    let (mut pipeline, calls) = offline_pipeline(config);
    let summary = pipeline.ingest(&IngestSource::File(doc), true).await.unwrap();
    assert!(!summary.reused);
    assert!(calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn persisted_index_answers_after_reload() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(
        tmp.path(),
        "facts.txt",
        "The warehouse inventory is counted every Friday morning.",
    );
    let config = test_config(&tmp.path().join("index"));

    let (mut pipeline, _) = offline_pipeline(config.clone());
    pipeline
        .ingest(&IngestSource::File(doc), false)
        .await
        .unwrap();
    drop(pipeline);

    let (mut pipeline, _) = offline_pipeline(config);
    pipeline.load_existing_index().await.unwrap();
    let (answer, sources) = pipeline.query("inventory", true).await.unwrap();
    assert_eq!(answer, "the answer");
    assert!(!sources.unwrap().is_empty());
}
