//! Document loading from files and directories.
//!
//! Directory loads aggregate per-file outcomes into a [`LoadReport`] instead
//! of aborting on the first bad file: files that fail to extract are
//! recorded and skipped, and the load only fails when nothing could be
//! loaded at all.

use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::error::RagError;
use crate::extract;
use crate::models::{Document, Metadata};

/// Where ingestion reads documents from.
#[derive(Debug, Clone)]
pub enum IngestSource {
    File(PathBuf),
    Directory {
        path: PathBuf,
        /// Extension filter (with or without leading dot); `None` loads
        /// every supported type.
        file_types: Option<Vec<String>>,
        recursive: bool,
    },
}

/// Outcome of loading a source: the documents plus per-file failure detail.
#[derive(Debug)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub loaded_files: usize,
    pub failed: Vec<(PathBuf, RagError)>,
}

/// Load documents from a file or directory source.
pub fn load_documents(source: &IngestSource) -> Result<LoadReport, RagError> {
    match source {
        IngestSource::File(path) => {
            let documents = load_file(path)?;
            Ok(LoadReport {
                documents,
                loaded_files: 1,
                failed: Vec::new(),
            })
        }
        IngestSource::Directory {
            path,
            file_types,
            recursive,
        } => load_directory(path, file_types.as_deref(), *recursive),
    }
}

/// Load a single document file based on its extension.
pub fn load_file(path: &Path) -> Result<Vec<Document>, RagError> {
    if !path.exists() {
        return Err(RagError::NotFound(format!(
            "file not found at {}",
            path.display()
        )));
    }

    let ext = extension_of(path).ok_or_else(|| {
        RagError::UnsupportedFormat(format!("{} has no file extension", path.display()))
    })?;
    if !extract::is_supported(&ext) {
        return Err(RagError::UnsupportedFormat(format!(
            "{} (supported: {})",
            ext,
            extract::SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let content = extract::extract_file(path, &ext)?;

    let mut metadata = Metadata::new();
    metadata.insert("source".into(), Value::from(path.display().to_string()));
    if let Some(name) = path.file_name() {
        metadata.insert(
            "file_name".into(),
            Value::from(name.to_string_lossy().into_owned()),
        );
    }

    Ok(vec![Document::new(content, metadata)])
}

/// List supported files under `directory`, filtered and sorted.
/// Unreadable entries are warned about and skipped.
pub fn list_files(
    directory: &Path,
    file_types: Option<&[String]>,
    recursive: bool,
) -> Result<Vec<PathBuf>, RagError> {
    let (files, skipped) = scan_directory(directory, file_types, recursive)?;
    for (path, e) in &skipped {
        eprintln!("Warning: skipping {}: {}", path.display(), e);
    }
    Ok(files)
}

/// Walk `directory`, returning the supported files plus any entries the
/// traversal could not read. Traversal errors never abort the scan.
fn scan_directory(
    directory: &Path,
    file_types: Option<&[String]>,
    recursive: bool,
) -> Result<(Vec<PathBuf>, Vec<(PathBuf, RagError)>), RagError> {
    if !directory.exists() {
        return Err(RagError::NotFound(format!(
            "directory not found at {}",
            directory.display()
        )));
    }
    if !directory.is_dir() {
        return Err(RagError::Configuration(format!(
            "path is not a directory: {}",
            directory.display()
        )));
    }

    let allowed = normalize_file_types(file_types);

    let mut walker = WalkDir::new(directory);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| directory.to_path_buf());
                skipped.push((path, RagError::Persistence(e.to_string())));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = extension_of(entry.path()) {
            if allowed.iter().any(|a| a == &ext) {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    Ok((files, skipped))
}

/// Load every supported document in a directory. Per-file extraction
/// failures and unreadable directory entries are collected, not fatal,
/// unless zero documents result.
pub fn load_directory(
    directory: &Path,
    file_types: Option<&[String]>,
    recursive: bool,
) -> Result<LoadReport, RagError> {
    let (files, mut failed) = scan_directory(directory, file_types, recursive)?;
    for (path, e) in &failed {
        eprintln!("Warning: skipping {}: {}", path.display(), e);
    }
    if files.is_empty() {
        return Err(RagError::NotFound(format!(
            "no supported files found in directory: {}",
            directory.display()
        )));
    }

    let mut documents = Vec::new();
    let mut loaded_files = 0usize;

    for file in files {
        match load_file(&file) {
            Ok(docs) => {
                documents.extend(docs);
                loaded_files += 1;
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", file.display(), e);
                failed.push((file, e));
            }
        }
    }

    if documents.is_empty() {
        return Err(RagError::NotFound(format!(
            "no documents could be loaded from {} ({} file(s) failed)",
            directory.display(),
            failed.len()
        )));
    }

    Ok(LoadReport {
        documents,
        loaded_files,
        failed,
    })
}

/// Normalize a requested extension filter: add missing dots, lowercase,
/// and drop (with a warning) anything outside the supported set. `None`
/// means all supported types.
fn normalize_file_types(file_types: Option<&[String]>) -> Vec<String> {
    match file_types {
        None => extract::SUPPORTED_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect(),
        Some(types) => {
            let mut allowed = Vec::new();
            for t in types {
                let ext = if t.starts_with('.') {
                    t.to_lowercase()
                } else {
                    format!(".{}", t.to_lowercase())
                };
                if extract::is_supported(&ext) {
                    allowed.push(ext);
                } else {
                    eprintln!("Warning: ignoring unsupported file type: {}", ext);
                }
            }
            allowed
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}
