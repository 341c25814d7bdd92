//! Character-window chunking for ingestion pipelines.
//!
//! Windows are cut on `char` boundaries so any UTF-8 input stays valid.
//! With `overlap = 0` the chunks partition the input exactly:
//! concatenating them reproduces the original text byte-for-byte.

use crate::error::{Error, Result};

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Window size; must be positive
    pub size: usize,
    /// Characters shared between consecutive windows; must be smaller than
    /// `size`
    pub overlap: usize,
}

impl ChunkOptions {
    /// Non-overlapping windows of the given size.
    #[must_use]
    pub fn exact(size: usize) -> Self {
        Self { size, overlap: 0 }
    }
}

/// One chunk of the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk content
    pub text: String,
    /// Byte offset of the chunk start in the original text
    pub offset: usize,
    /// Zero-based position in the chunk sequence
    pub index: usize,
}

/// Split text into (optionally overlapping) character windows.
///
/// # Errors
///
/// `InvalidArgument` when `size` is zero or `overlap >= size`.
pub fn chunk(text: &str, options: ChunkOptions) -> Result<Vec<Chunk>> {
    if options.size == 0 {
        return Err(Error::InvalidArgument("chunk size must be positive".into()));
    }
    if options.overlap >= options.size {
        return Err(Error::InvalidArgument(format!(
            "overlap {} must be smaller than chunk size {}",
            options.overlap, options.size
        )));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end sentinel.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;
    let step = options.size - options.overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;
    while start < char_count {
        let end = (start + options.size).min(char_count);
        let byte_start = boundaries[start];
        let byte_end = boundaries[end];
        chunks.push(Chunk {
            text: text[byte_start..byte_end].to_string(),
            offset: byte_start,
            index,
        });
        if end == char_count {
            break;
        }
        start += step;
        index += 1;
    }
    Ok(chunks)
}
