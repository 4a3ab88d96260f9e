#[cfg(test)]
mod tests;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::PageText;

/// A window of page text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// The chunk text
    pub text: String,
    /// PDF the chunk was cut from
    pub source_file: String,
    /// 1-based page number within the PDF
    pub page_number: u32,
    /// Position of this window within its page
    pub chunk_index: usize,
}

/// Configuration for content chunking
///
/// Sizes are measured in characters (Unicode scalar values), not bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length
    pub chunk_size: usize,
    /// Number of characters shared by adjacent windows of the same page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Distance between the starts of two adjacent windows
    #[inline]
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap)
    }
}

/// Split every page into overlapping windows, keeping page order
#[inline]
pub fn chunk_pages(pages: &[PageText], config: &ChunkingConfig) -> Result<Vec<DocumentChunk>> {
    let mut chunks = Vec::new();

    for page in pages {
        chunks.extend(chunk_page(page, config)?);
    }

    debug!(
        "Chunked {} pages into {} chunks (avg {} chars)",
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Split a single page into overlapping windows tagged with its source metadata
#[inline]
pub fn chunk_page(page: &PageText, config: &ChunkingConfig) -> Result<Vec<DocumentChunk>> {
    if page.source_file.trim().is_empty() || page.page_number == 0 {
        bail!(
            "Page is missing source metadata (source: '{}', page: {})",
            page.source_file,
            page.page_number
        );
    }

    if page.text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chunks = split_text(&page.text, config)?
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(chunk_index, text)| DocumentChunk {
            text,
            source_file: page.source_file.clone(),
            page_number: page.page_number,
            chunk_index,
        })
        .collect();

    Ok(chunks)
}

/// Cut `text` into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one
///
/// The final window ends exactly at the end of the text, so text shorter than
/// one window yields a single chunk.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    if config.chunk_size == 0 {
        bail!("Chunk size must be greater than zero");
    }
    if config.chunk_overlap >= config.chunk_size {
        bail!(
            "Chunk overlap ({}) must be smaller than chunk size ({})",
            config.chunk_overlap,
            config.chunk_size
        );
    }

    // byte offset of every char boundary, including the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut windows = Vec::new();
    if char_count == 0 {
        return Ok(windows);
    }

    let step = config.step();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(char_count);
        if let Some(window) = text.get(boundaries[start]..boundaries[end]) {
            windows.push(window.to_string());
        }
        if end == char_count {
            break;
        }
        start += step;
    }

    Ok(windows)
}
