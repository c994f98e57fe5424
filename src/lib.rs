//! # ragpipe
//!
//! A local-first retrieval-augmented generation pipeline.
//!
//! ragpipe ingests documents (PDF, Word, plain text, Markdown), splits them
//! into overlapping chunks, embeds and persists them in a SQLite-backed
//! vector index, and answers questions by retrieving the most relevant
//! chunks and handing them to a chat model as cited context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌───────────┐   ┌──────────┐
//! │  Loader  │──▶│ Chunker │──▶│  Vector   │──▶│ Retriever │
//! │ pdf/docx │   │ overlap │   │  index    │   │  top-k   │
//! │ txt/md   │   │  split  │   │ (SQLite)  │   └────┬─────┘
//! └──────────┘   └─────────┘   └───────────┘        │
//!                                                   ▼
//!                                             ┌───────────┐
//!                                             │ Generator │
//!                                             │ chat model│
//!                                             └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest --directory ./docs        # build the index
//! rag query "What is covered?"         # one-shot question
//! rag chat                             # interactive session
//! rag ingest --directory ./docs --force  # rebuild from scratch
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | Per-format text extraction |
//! | [`loader`] | File and directory document loading |
//! | [`chunker`] | Recursive overlapping text splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted vector index |
//! | [`retriever`] | Similarity retrieval |
//! | [`generator`] | Context-grounded answer generation |
//! | [`pipeline`] | End-to-end orchestration and chat loop |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generator;
pub mod index;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod retriever;
