// Embeddings module
// Text chunking and the embedding model used for both chunks and questions

pub mod chunking;
pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;

pub use chunking::{ChunkingConfig, DocumentChunk, chunk_page, chunk_pages, split_text};
pub use ollama::OllamaClient;

/// Maps text to fixed-dimension vectors
///
/// The same implementation must embed the corpus and the questions asked
/// against it, otherwise similarity scores are meaningless.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
