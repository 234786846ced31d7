//! Fixed-window text chunking
//!
//! Splits normalized document text into overlapping windows measured in
//! characters (not bytes). Window `i` starts at `i * (size - overlap)`;
//! emission stops once a window start reaches the end of the text.

use crate::config::ChunkConfig;
use crate::error::{Error, Result};

/// A text chunk with its position in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk's text
    pub content: String,

    /// Chunk index (0-based, dense)
    pub index: usize,

    /// Character offset of the first character
    pub char_start: usize,

    /// Character offset one past the last character
    pub char_end: usize,
}

impl TextChunk {
    /// Size metric stored with the chunk row (character count)
    pub fn tokens(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Chunk text with the configured window size and overlap
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<TextChunk>> {
    chunk_text_with(text, config.size, config.overlap)
}

/// Chunk text into windows of `size` characters overlapping by `overlap`
pub fn chunk_text_with(text: &str, size: usize, overlap: usize) -> Result<Vec<TextChunk>> {
    if size == 0 || overlap >= size {
        return Err(Error::Config(format!(
            "chunk size {} must be positive and greater than overlap {}",
            size, overlap
        )));
    }

    if text.trim().is_empty() {
        return Err(Error::EmptyDocumentText);
    }

    // Byte offset of every char, plus the end of the string
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = offsets.len();
    offsets.push(text.len());

    let step = size - overlap;
    let mut chunks = Vec::with_capacity(char_len.div_ceil(step));
    let mut start = 0;

    while start < char_len {
        let end = usize::min(start + size, char_len);
        chunks.push(TextChunk {
            content: text[offsets[start]..offsets[end]].to_string(),
            index: chunks.len(),
            char_start: start,
            char_end: end,
        });
        start += step;
    }

    Ok(chunks)
}

/// Vector id for a chunk: `{document_id}_{chunk_index}`
pub fn vector_id(document_id: &str, chunk_index: usize) -> String {
    format!("{}_{}", document_id, chunk_index)
}
