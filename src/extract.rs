//! Per-format text extraction for document files.
//!
//! Given a file's bytes and its lowercase extension, returns plain UTF-8
//! text. Plain text and Markdown pass through as-is; PDF goes through
//! `pdf-extract`; Word documents are unzipped and their `w:t` runs pulled
//! out of `word/document.xml`.

use std::io::Read;
use std::path::Path;

use crate::error::RagError;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions (with leading dot) that [`extract_file`] understands.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = [".pdf", ".txt", ".md", ".docx", ".doc"];

/// True if `ext` (lowercase, with leading dot) is a supported file type.
pub fn is_supported(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext)
}

/// Extract plain text from `path`, dispatching on `ext`.
pub fn extract_file(path: &Path, ext: &str) -> Result<String, RagError> {
    match ext {
        ".txt" | ".md" => {
            let bytes = std::fs::read(path)
                .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        ".pdf" => {
            let bytes = std::fs::read(path)
                .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
            extract_pdf(&bytes)
        }
        ".docx" | ".doc" => {
            let bytes = std::fs::read(path)
                .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
            extract_docx(&bytes)
        }
        other => Err(RagError::UnsupportedFormat(format!(
            "{} (supported: {})",
            other,
            SUPPORTED_EXTENSIONS.join(", ")
        ))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, RagError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF: {}", e)))
}

fn extract_docx(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extraction(format!("OOXML: {}", e)))?;

    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| RagError::Extraction(format!("OOXML: {}", e)))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| RagError::Extraction(format!("OOXML: {}", e)))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(RagError::Extraction(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(RagError::Extraction(
            "word/document.xml not found".to_string(),
        ));
    }

    extract_text_runs(&doc_xml)
}

/// Collect the text of every `<w:t>` run, inserting newlines at paragraph
/// ends so the chunker's separator list still has boundaries to work with.
fn extract_text_runs(xml: &[u8]) -> Result<String, RagError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(RagError::Extraction(format!("OOXML: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = extract_file(Path::new("x.xyz"), ".xyz").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_pdf_is_an_extraction_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a pdf").unwrap();
        let err = extract_file(tmp.path(), ".pdf").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn invalid_zip_is_an_extraction_error_for_docx() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a zip").unwrap();
        let err = extract_file(tmp.path(), ".docx").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn plain_text_passes_through() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "plain text body").unwrap();
        let text = extract_file(tmp.path(), ".txt").unwrap();
        assert_eq!(text, "plain text body");
    }
}
