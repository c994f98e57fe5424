//! # ragpipe CLI (`rag`)
//!
//! The `rag` binary drives the pipeline end to end: ingest documents into
//! a persisted vector index, then answer questions against it.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest --file <path>` | Index a single document |
//! | `rag ingest --directory <path>` | Index every supported file in a directory |
//! | `rag query "<question>"` | Answer a one-shot question from the index |
//! | `rag chat` | Interactive question loop |
//!
//! ## Examples
//!
//! ```bash
//! # Build the index from a docs directory
//! rag ingest --directory ./docs
//!
//! # Restrict to certain file types, top level only
//! rag ingest --directory ./docs --file-types pdf md --no-recursive
//!
//! # Rebuild from scratch even if an index exists
//! rag ingest --directory ./docs --force
//!
//! # Preview which files an ingest would pick up
//! rag ingest --directory ./docs --list-files
//!
//! # Ask a question without printing sources
//! rag query "What is the refund policy?" --no-sources
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ragpipe::config;
use ragpipe::error::RagError;
use ragpipe::loader::{self, IngestSource};
use ragpipe::pipeline::{print_sources, Pipeline};

/// ragpipe CLI: a local-first retrieval-augmented generation pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Ingest documents and answer questions from them with cited sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./rag.toml`. Index location, chunking, retrieval,
    /// embedding, and generation settings are read from this file.
    #[arg(long, global = true, default_value = "./rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest documents into the vector index.
    ///
    /// Loads documents from a file or directory, chunks and embeds them,
    /// and persists the index at the configured location. If an index
    /// already exists it is reused without reading any documents; pass
    /// `--force` to rebuild it.
    Ingest {
        /// Path to a single document file.
        #[arg(long, conflicts_with = "directory")]
        file: Option<PathBuf>,

        /// Path to a directory of documents.
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Restrict directory ingestion to these file types
        /// (e.g. `--file-types pdf md`).
        #[arg(long, num_args = 1.., requires = "directory")]
        file_types: Option<Vec<String>>,

        /// List the files an ingest would load, then exit.
        #[arg(long, requires = "directory")]
        list_files: bool,

        /// Do not descend into subdirectories.
        #[arg(long, requires = "directory")]
        no_recursive: bool,

        /// Discard any existing index and rebuild from the documents.
        #[arg(long)]
        force: bool,
    },

    /// Answer a single question from the indexed documents.
    ///
    /// Requires a previously built index (see `rag ingest`).
    Query {
        /// The question to answer.
        question: String,

        /// Print only the answer, without source previews.
        #[arg(long)]
        no_sources: bool,
    },

    /// Interactive question loop over the indexed documents.
    ///
    /// Type `quit`, `exit`, or `stop` to end the session.
    Chat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Hint: {}", e.remediation());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RagError> {
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            file,
            directory,
            file_types,
            list_files,
            no_recursive,
            force,
        } => {
            let source = match (file, directory) {
                (Some(path), None) => IngestSource::File(path),
                (None, Some(path)) => IngestSource::Directory {
                    path,
                    file_types,
                    recursive: !no_recursive,
                },
                _ => {
                    return Err(RagError::Configuration(
                        "pass exactly one of --file or --directory".to_string(),
                    ))
                }
            };

            if list_files {
                if let IngestSource::Directory {
                    path,
                    file_types,
                    recursive,
                } = &source
                {
                    print_file_listing(path, file_types.as_deref(), *recursive)?;
                }
                return Ok(());
            }

            let mut pipeline = Pipeline::new(cfg)?;
            let summary = pipeline.ingest(&source, force).await?;

            if summary.reused {
                println!(
                    "Reusing existing index ({} chunks). Pass --force to rebuild.",
                    summary.chunks_indexed
                );
            } else {
                println!(
                    "Indexed {} chunk(s) from {} document(s).",
                    summary.chunks_indexed, summary.documents_loaded
                );
                if summary.files_failed > 0 {
                    println!("{} file(s) failed to load and were skipped.", summary.files_failed);
                }
            }
        }

        Commands::Query {
            question,
            no_sources,
        } => {
            let mut pipeline = Pipeline::new(cfg)?;
            pipeline.load_existing_index().await?;

            let (answer, sources) = pipeline.query(&question, !no_sources).await?;

            println!("\n{}", "=".repeat(60));
            println!("QUESTION: {}", question);
            println!("{}", "=".repeat(60));
            println!("\nANSWER:\n{}", answer);
            if let Some(sources) = sources {
                print_sources(&sources);
            }
            println!("\n{}", "=".repeat(60));
        }

        Commands::Chat => {
            let mut pipeline = Pipeline::new(cfg)?;
            pipeline.load_existing_index().await?;
            pipeline.run_chat().await?;
        }
    }

    Ok(())
}

/// Print the files an ingest would load, grouped by extension.
fn print_file_listing(
    directory: &std::path::Path,
    file_types: Option<&[String]>,
    recursive: bool,
) -> Result<(), RagError> {
    let files = loader::list_files(directory, file_types, recursive)?;

    if files.is_empty() {
        println!("No supported files found in {}", directory.display());
        return Ok(());
    }

    let mut by_ext: BTreeMap<String, Vec<&PathBuf>> = BTreeMap::new();
    for file in &files {
        let ext = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        by_ext.entry(ext).or_default().push(file);
    }

    println!("Found {} file(s) in {}:", files.len(), directory.display());
    for (ext, group) in &by_ext {
        println!("\n{} ({}):", ext, group.len());
        for file in group {
            println!("  {}", file.display());
        }
    }

    Ok(())
}
