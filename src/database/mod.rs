// Database module
// Persisted vector storage for embedded PDF chunks

pub mod lancedb;

pub use self::lancedb::vector_store::{SearchResult, VectorStore};
pub use self::lancedb::{ChunkMetadata, EmbeddingRecord};
