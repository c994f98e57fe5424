//! Pipeline orchestration: ingest, load, query, chat.
//!
//! The pipeline has exactly two states. It starts `Uninitialized` and
//! becomes `Ready` on a successful ingest or index load; `Ready` carries
//! the bound [`Retriever`], so querying without one is unrepresentable.
//! There is no way back to `Uninitialized`.

use std::io::{BufRead, Write};

use crate::chunker::Chunker;
use crate::config::RagConfig;
use crate::embedding::{create_embedder, Embedder};
use crate::error::RagError;
use crate::generator::{create_chat_model, ChatModel, Generator};
use crate::index::VectorIndex;
use crate::loader::{self, IngestSource};
use crate::models::Chunk;
use crate::retriever::Retriever;

use std::sync::Arc;

enum PipelineState {
    Uninitialized,
    Ready(Retriever),
}

/// Counters reported after an ingest call.
#[derive(Debug)]
pub struct IngestSummary {
    /// True when an existing index was reused instead of rebuilding.
    pub reused: bool,
    pub documents_loaded: usize,
    pub files_failed: usize,
    pub chunks_indexed: usize,
}

pub struct Pipeline {
    config: RagConfig,
    chunker: Chunker,
    index: VectorIndex,
    generator: Generator,
    state: PipelineState,
}

impl Pipeline {
    /// Build a pipeline with collaborators resolved from the configuration.
    pub fn new(config: RagConfig) -> Result<Self, RagError> {
        let embedder = create_embedder(&config.embedding)?;
        let chat_model = create_chat_model(&config.generation)?;
        Self::with_components(config, embedder, chat_model)
    }

    /// Build a pipeline around caller-supplied collaborators. This is the
    /// seam used by tests to substitute deterministic providers.
    pub fn with_components(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        chat_model: Box<dyn ChatModel>,
    ) -> Result<Self, RagError> {
        let chunker = Chunker::new(&config.chunking)?;
        let generator = Generator::new(chat_model, config.generation.system_prompt.clone());
        let index = VectorIndex::new(config.index.path.clone(), embedder);

        Ok(Self {
            config,
            chunker,
            index,
            generator,
            state: PipelineState::Uninitialized,
        })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PipelineState::Ready(_))
    }

    /// Ingest documents, or reuse the persisted index.
    ///
    /// With `force_recreate` false and an index already at the configured
    /// location, the source is not read at all: the existing index is
    /// loaded and the pipeline becomes ready. Repeated calls are therefore
    /// idempotent and embed nothing. With `force_recreate` true the old
    /// storage location is discarded entirely before rebuilding.
    pub async fn ingest(
        &mut self,
        source: &IngestSource,
        force_recreate: bool,
    ) -> Result<IngestSummary, RagError> {
        if !force_recreate && self.index.exists() {
            let handle = self.index.load_existing().await?;
            let records = handle.record_count().await?;
            self.state = PipelineState::Ready(Retriever::new(handle, &self.config.retrieval)?);
            return Ok(IngestSummary {
                reused: true,
                documents_loaded: 0,
                files_failed: 0,
                chunks_indexed: records as usize,
            });
        }

        if force_recreate && self.index.location().exists() {
            std::fs::remove_dir_all(self.index.location()).map_err(|e| {
                RagError::Persistence(format!(
                    "cannot discard old index at {}: {}",
                    self.index.location().display(),
                    e
                ))
            })?;
        }

        let report = loader::load_documents(source)?;
        let chunks = self.chunker.split_documents(&report.documents);
        let handle = self.index.create(&chunks).await?;
        self.state = PipelineState::Ready(Retriever::new(handle, &self.config.retrieval)?);

        Ok(IngestSummary {
            reused: false,
            documents_loaded: report.documents.len(),
            files_failed: report.failed.len(),
            chunks_indexed: chunks.len(),
        })
    }

    /// Load a persisted index without touching any document source. On
    /// failure the pipeline stays in its current state.
    pub async fn load_existing_index(&mut self) -> Result<(), RagError> {
        let handle = self.index.load_existing().await?;
        self.state = PipelineState::Ready(Retriever::new(handle, &self.config.retrieval)?);
        Ok(())
    }

    /// Answer a question from the indexed corpus.
    ///
    /// Returns the answer, and the source chunks only when `want_sources`
    /// is set. Valid only once the pipeline is ready.
    pub async fn query(
        &self,
        question: &str,
        want_sources: bool,
    ) -> Result<(String, Option<Vec<Chunk>>), RagError> {
        let retriever = match &self.state {
            PipelineState::Ready(retriever) => retriever,
            PipelineState::Uninitialized => {
                return Err(RagError::NotInitialized(
                    "call ingest() or load_existing_index() first".to_string(),
                ))
            }
        };

        let context = retriever.retrieve(question, None).await?;
        let (answer, sources) = self.generator.generate(question, context).await?;

        Ok((answer, want_sources.then_some(sources)))
    }

    /// Interactive question loop over stdin. Per-turn errors are printed
    /// and the loop continues; `quit`, `exit`, or `stop` ends the session.
    pub async fn run_chat(&self) -> Result<(), RagError> {
        if !self.is_ready() {
            return Err(RagError::NotInitialized(
                "call ingest() or load_existing_index() first".to_string(),
            ));
        }

        println!();
        println!("{}", "=".repeat(60));
        println!("ragpipe interactive chat");
        println!("{}", "=".repeat(60));
        println!("Ask me anything! Type 'quit', 'exit', or 'stop' to end.");
        println!();

        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print!("Your question: ");
            let _ = std::io::stdout().flush();

            let line = match lines.next() {
                Some(Ok(line)) => line,
                _ => break, // EOF
            };
            let question = line.trim();

            if matches!(question.to_lowercase().as_str(), "quit" | "exit" | "stop") {
                println!("\nGoodbye.");
                break;
            }
            if question.is_empty() {
                println!("Please enter a question.\n");
                continue;
            }

            match self.query(question, true).await {
                Ok((answer, sources)) => {
                    println!("\n{}", "=".repeat(60));
                    println!("ANSWER:\n{}", answer);
                    if let Some(sources) = sources {
                        print_sources(&sources);
                    }
                    println!("{}\n", "=".repeat(60));
                }
                Err(e) => {
                    println!("\nError: {}\n", e);
                }
            }
        }

        Ok(())
    }
}

/// Print previews of up to three source chunks.
pub fn print_sources(sources: &[Chunk]) {
    if sources.is_empty() {
        return;
    }
    println!("\n{}", "-".repeat(60));
    println!("SOURCES ({} chunks):", sources.len());
    for (i, chunk) in sources.iter().take(3).enumerate() {
        let preview: String = chunk.content.chars().take(200).collect();
        println!("\nSource {}:", i + 1);
        println!("  {}...", preview.replace('\n', " "));
        if let Some(page) = chunk.metadata.get("page") {
            println!("  Page: {}", page);
        }
    }
}
