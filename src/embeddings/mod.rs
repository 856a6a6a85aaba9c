// Embeddings module
// Text chunking, the embedding capability, and the Ollama client behind it

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{ChunkingConfig, TextChunk, chunk_text};
pub use ollama::OllamaClient;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model, and the same vector space
/// must be used for stored chunks and for queries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of chunk texts, returning one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
