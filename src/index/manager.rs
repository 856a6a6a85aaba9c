//! Lifecycle of the persisted index: add, remove-by-document and clear-all.
//!
//! Every mutation is a load-modify-save over the whole index, serialized by a
//! per-manager lock. Queries share a read guard so they never observe a save in
//! progress. Separate processes pointed at the same directory are not coordinated
//! and the last writer wins.


use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{IndexStore, SearchHit, StoredChunk, VectorIndex};
use crate::embeddings::{ChunkingConfig, EmbeddingProvider, chunk_text};
use crate::{QaError, Result};

/// Outcome of removing one document's chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemovalStats {
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub chunks: usize,
    pub documents: usize,
    pub legacy_chunks: usize,
    pub dimension: usize,
}

pub struct IndexManager {
    store: IndexStore,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    lock: RwLock<()>,
}

impl IndexManager {
    #[inline]
    pub fn new(
        store: IndexStore,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
            lock: RwLock::new(()),
        }
    }

    #[inline]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    #[inline]
    pub fn has_index(&self) -> bool {
        self.store.exists()
    }

    /// Chunk, embed and append a document's text, returning the number of chunks added.
    ///
    /// Text that produces no chunks leaves the index untouched. The document id is
    /// recorded as given; callers are expected to have stored the document already.
    #[inline]
    pub async fn add_document(
        &self,
        text: &str,
        document_id: i64,
        filename: &str,
    ) -> Result<usize> {
        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            debug!(
                "Document {} ({}) produced no chunks, index unchanged",
                document_id, filename
            );
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        debug!("Embedding {} chunks for document {}", texts.len(), document_id);
        let vectors = self.embed_all(&texts).await?;

        let records: Vec<StoredChunk> = chunks
            .into_iter()
            .map(|c| StoredChunk::new(c.content, document_id, filename, c.chunk_index))
            .collect();
        let mut batch = VectorIndex::new(vector_dimension(&vectors)?);
        batch.append(vectors, records)?;
        let added = batch.len();

        let _guard = self.lock.write().await;

        let index = match self.load_unguarded().await? {
            Some(mut existing) => {
                existing.merge(batch)?;
                existing
            }
            None => batch,
        };
        let total = index.len();
        self.save_unguarded(index).await?;

        info!(
            "Indexed {} chunks for document {} ({}), {} chunks total",
            added, document_id, filename, total
        );
        Ok(added)
    }

    /// Drop every chunk owned by `document_id` and rebuild the index from the rest.
    ///
    /// Surviving chunks are re-embedded from their text. Chunks without a document id
    /// always survive. When nothing survives the persisted index is deleted.
    #[inline]
    pub async fn remove_document(&self, document_id: i64) -> Result<RemovalStats> {
        let _guard = self.lock.write().await;

        let Some(index) = self.load_unguarded().await? else {
            debug!("No index present, nothing to remove for document {}", document_id);
            return Ok(RemovalStats::default());
        };

        let (removed, survivors): (Vec<StoredChunk>, Vec<StoredChunk>) = index
            .into_chunks()
            .into_iter()
            .partition(|c| c.document_id() == Some(document_id));

        if removed.is_empty() {
            debug!("Document {} has no indexed chunks", document_id);
            return Ok(RemovalStats {
                removed: 0,
                remaining: survivors.len(),
            });
        }

        if survivors.is_empty() {
            self.delete_unguarded().await?;
            info!(
                "Removed {} chunks for document {}, index is now empty",
                removed.len(),
                document_id
            );
            return Ok(RemovalStats {
                removed: removed.len(),
                remaining: 0,
            });
        }

        debug!(
            "Rebuilding index from {} surviving chunks",
            survivors.len()
        );
        let texts: Vec<String> = survivors.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let mut rebuilt = VectorIndex::new(vector_dimension(&vectors)?);
        rebuilt.append(vectors, survivors)?;
        let remaining = rebuilt.len();
        self.save_unguarded(rebuilt).await?;

        info!(
            "Removed {} chunks for document {}, rebuilt index with {} chunks",
            removed.len(),
            document_id,
            remaining
        );
        Ok(RemovalStats {
            removed: removed.len(),
            remaining,
        })
    }

    /// Delete the persisted index; succeeds when there is none
    #[inline]
    pub async fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.write().await;
        self.delete_unguarded().await?;
        info!("Cleared vector index");
        Ok(())
    }

    /// Snapshot of the persisted index, if any
    #[inline]
    pub async fn load(&self) -> Result<Option<VectorIndex>> {
        let _guard = self.lock.read().await;
        self.load_unguarded().await
    }

    /// Embed `query` and return the `k` nearest chunks, or `None` without an index
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Option<Vec<SearchHit>>> {
        let Some(index) = self.load().await? else {
            return Ok(None);
        };

        let query_vector = self.embedder.embed_query(query).await?;
        let hits = index.search(&query_vector, k)?;
        debug!("Retrieved {} chunks for query", hits.len());
        Ok(Some(hits))
    }

    #[inline]
    pub async fn stats(&self) -> Result<Option<IndexStats>> {
        Ok(self.load().await?.map(|index| IndexStats {
            chunks: index.len(),
            documents: index.document_ids().len(),
            legacy_chunks: index.legacy_chunk_count(),
            dimension: index.dimension(),
        }))
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_documents(texts).await?;
        if vectors.len() != texts.len() {
            return Err(QaError::Provider(format!(
                "Expected {} embeddings, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn load_unguarded(&self) -> Result<Option<VectorIndex>> {
        let store = self.store.clone();
        run_blocking(move || store.load()).await
    }

    async fn save_unguarded(&self, index: VectorIndex) -> Result<()> {
        let store = self.store.clone();
        run_blocking(move || store.save(&index)).await
    }

    async fn delete_unguarded(&self) -> Result<()> {
        let store = self.store.clone();
        run_blocking(move || store.delete()).await
    }
}

fn vector_dimension(vectors: &[Vec<f32>]) -> Result<usize> {
    match vectors.first().map(Vec::len) {
        Some(dimension) if dimension > 0 => Ok(dimension),
        _ => Err(QaError::Provider(
            "Embedding provider returned empty vectors".to_string(),
        )),
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| QaError::Index(format!("Index task failed: {}", e)))?
}
