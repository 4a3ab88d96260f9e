// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::embeddings::DocumentChunk;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata stored alongside each embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// PDF the chunk was cut from
    pub source_file: String,
    /// 1-based page number within the PDF
    pub page_number: u32,
    /// Position of the chunk within its page
    pub chunk_index: u32,
    /// The chunk text handed to the language model as context
    pub content: String,
    /// RFC 3339 timestamp of the ingest run that stored the chunk
    pub created_at: String,
}

impl EmbeddingRecord {
    /// Pair a chunk with its embedding under a fresh id
    #[inline]
    pub fn from_chunk(chunk: &DocumentChunk, vector: Vec<f32>, created_at: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata {
                source_file: chunk.source_file.clone(),
                page_number: chunk.page_number,
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                content: chunk.text.clone(),
                created_at: created_at.to_string(),
            },
        }
    }
}
