//! Recursive separator-priority text splitter.
//!
//! Splits document text by the first separator from a priority list that
//! actually occurs in the text, recursively re-splitting any piece still
//! longer than `chunk_size` with the remaining separators. The empty string
//! acts as the final separator and splits between any two characters, which
//! guarantees termination. Pieces are then merged back up to `chunk_size`,
//! re-including the trailing pieces of the previous chunk (summing to
//! roughly `chunk_overlap`) at the start of the next one.
//!
//! Sizes are measured in bytes of UTF-8; splits land only on char
//! boundaries, so a chunk can exceed `chunk_size` by at most the width of
//! one character. Every chunk is a contiguous substring of its source
//! document and carries the byte offset of its first character as
//! `start_index`.
//!
//! An empty document produces zero chunks.

use crate::config::ChunkingConfig;
use crate::error::RagError;
use crate::models::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Build a chunker, rejecting malformed configuration up front.
    pub fn new(config: &ChunkingConfig) -> Result<Self, RagError> {
        if config.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        let mut separators = config.separators.clone();
        // The empty separator is the termination guarantee.
        if separators.last().map(String::as_str) != Some("") {
            separators.push(String::new());
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators,
        })
    }

    /// Split documents into overlapping chunks. Each chunk inherits its
    /// source document's metadata unchanged.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            for (start, end) in self.split_ranges(&doc.content) {
                chunks.push(Chunk {
                    content: doc.content[start..end].to_string(),
                    start_index: start,
                    metadata: doc.metadata.clone(),
                });
            }
        }
        chunks
    }

    /// Byte ranges of the chunks of `text`, in order.
    fn split_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.split_recursive(text, 0, text.len(), &self.separators, &mut pieces);
        self.merge_pieces(&pieces)
    }

    /// Break `text[start..end]` into ordered contiguous pieces no longer
    /// than `chunk_size` (single characters excepted), descending through
    /// the separator priority list.
    fn split_recursive(
        &self,
        text: &str,
        start: usize,
        end: usize,
        separators: &[String],
        out: &mut Vec<(usize, usize)>,
    ) {
        if end - start <= self.chunk_size {
            out.push((start, end));
            return;
        }

        let segment = &text[start..end];

        // First separator that occurs in this segment; the trailing empty
        // separator always matches.
        let sep_idx = separators
            .iter()
            .position(|sep| sep.is_empty() || segment.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = &separators[sep_idx];
        let remaining = &separators[sep_idx + 1..];

        if separator.is_empty() {
            // Split between any two characters.
            for (i, c) in segment.char_indices() {
                out.push((start + i, start + i + c.len_utf8()));
            }
            return;
        }

        // Piece boundaries sit at each separator occurrence, with the
        // separator attached to the front of the following piece so that
        // concatenating the pieces reproduces the segment exactly.
        let mut boundaries: Vec<usize> = vec![start];
        for (pos, _) in segment.match_indices(separator.as_str()) {
            if pos > 0 {
                boundaries.push(start + pos);
            }
        }
        boundaries.push(end);

        for pair in boundaries.windows(2) {
            let (piece_start, piece_end) = (pair[0], pair[1]);
            if piece_end - piece_start <= self.chunk_size {
                out.push((piece_start, piece_end));
            } else {
                self.split_recursive(text, piece_start, piece_end, remaining, out);
            }
        }
    }

    /// Pack adjacent pieces into chunks of up to `chunk_size`, keeping a
    /// trailing window of roughly `chunk_overlap` bytes as the start of the
    /// next chunk.
    fn merge_pieces(&self, pieces: &[(usize, usize)]) -> Vec<(usize, usize)> {
        let mut chunks = Vec::new();
        let mut window: Vec<(usize, usize)> = Vec::new();
        let mut total = 0usize;

        for &(start, end) in pieces {
            let len = end - start;

            if !window.is_empty() && total + len > self.chunk_size {
                chunks.push((window[0].0, window[window.len() - 1].1));

                // Shed leading pieces until the retained tail fits the
                // overlap budget and leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    let (s, e) = window.remove(0);
                    total -= e - s;
                }
            }

            window.push((start, end));
            total += len;
        }

        if !window.is_empty() {
            chunks.push((window[0].0, window[window.len() - 1].1));
        }

        chunks
    }
}
