//! Text extraction for uploaded documents
//!
//! Turns raw file bytes into the single-line normalized text the chunker
//! consumes. Binary formats are decoded lossily; only HTML gets a real
//! conversion pass.

use crate::error::{Error, Result};

/// Text extracted from one file
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Normalized text, never empty
    pub text: String,
    /// MIME type used to pick the decoder
    pub mime_type: String,
    /// Size of the raw input
    pub size_bytes: usize,
    /// blake3 hex digest of the raw input
    pub checksum: String,
}

/// Resolve the MIME type, falling back to a guess from the filename
pub fn resolve_mime_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Collapse NULs and whitespace runs to single spaces and trim
pub fn normalize_text(raw: &str) -> String {
    raw.replace('\u{0000}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute a stable hash for document content
pub fn compute_checksum(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Decode and normalize a file's bytes
///
/// Fails with [`Error::EmptyDocumentText`] when nothing but whitespace
/// survives normalization.
pub fn extract_text(bytes: &[u8], mime_type: &str) -> Result<ExtractedText> {
    let decoded = String::from_utf8_lossy(bytes);

    let raw = if is_html(mime_type) {
        html2text::from_read(decoded.as_bytes(), 120).unwrap_or_else(|_| decoded.to_string())
    } else {
        decoded.into_owned()
    };

    let text = normalize_text(&raw);
    if text.is_empty() {
        return Err(Error::EmptyDocumentText);
    }

    Ok(ExtractedText {
        text,
        mime_type: mime_type.to_string(),
        size_bytes: bytes.len(),
        checksum: compute_checksum(bytes),
    })
}

fn is_html(mime_type: &str) -> bool {
    let lower = mime_type.to_ascii_lowercase();
    lower.starts_with("text/html") || lower.starts_with("application/xhtml")
}
