// Vector index module
// Persisted nearest-neighbour index over embedded chunks, with per-chunk provenance


pub mod consistency;
pub mod flat;
pub mod manager;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{QaError, Result};

pub use consistency::{ConsistencyReport, ConsistencyValidator};
pub use flat::FlatIndex;
pub use manager::{IndexManager, IndexStats, RemovalStats};
pub use store::IndexStore;

/// Provenance tying a chunk back to the document it came from.
///
/// Every field is optional: chunks written before provenance tracking existed carry
/// none of them, and readers must cope with any subset being present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

/// A chunk record as persisted in the metadata sidecar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Option<ChunkMetadata>,
}

impl StoredChunk {
    #[inline]
    pub fn new(text: String, document_id: i64, filename: &str, chunk_index: usize) -> Self {
        Self {
            text,
            metadata: Some(ChunkMetadata {
                document_id: Some(document_id),
                filename: Some(filename.to_string()),
                chunk_index: Some(chunk_index),
            }),
        }
    }

    /// A chunk without any provenance
    #[inline]
    pub fn legacy(text: String) -> Self {
        Self {
            text,
            metadata: None,
        }
    }

    #[inline]
    pub fn document_id(&self) -> Option<i64> {
        self.metadata.as_ref().and_then(|m| m.document_id)
    }

    #[inline]
    pub fn filename(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.filename.as_deref())
    }

    #[inline]
    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata.as_ref().and_then(|m| m.chunk_index)
    }
}

/// One retrieved chunk, nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Position of the chunk within the index
    pub position: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
    pub chunk: StoredChunk,
}

/// Chunk records plus the nearest-neighbour structure over their vectors.
///
/// Position `i` of the structure always holds the vector of `chunks[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    vectors: FlatIndex,
    chunks: Vec<StoredChunk>,
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: FlatIndex::new(dimension),
            chunks: Vec::new(),
        }
    }

    /// Build an index from vectors and records that must line up one to one
    #[inline]
    pub fn from_parts(vectors: FlatIndex, chunks: Vec<StoredChunk>) -> Result<Self> {
        if vectors.len() != chunks.len() {
            return Err(QaError::Index(format!(
                "{} vectors but {} chunk records",
                vectors.len(),
                chunks.len()
            )));
        }
        Ok(Self { vectors, chunks })
    }

    /// Append chunks with their vectors; nothing is added if any vector is invalid
    #[inline]
    pub fn append(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<StoredChunk>) -> Result<()> {
        if vectors.len() != chunks.len() {
            return Err(QaError::Index(format!(
                "{} vectors supplied for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        self.vectors.add_batch(&vectors)?;
        self.chunks.extend(chunks);
        Ok(())
    }

    /// Append every chunk of `other` after the existing ones
    #[inline]
    pub fn merge(&mut self, other: VectorIndex) -> Result<()> {
        self.vectors.merge_from(&other.vectors)?;
        self.chunks.extend(other.chunks);
        Ok(())
    }

    /// Retrieve the `k` chunks nearest to `query`
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let hits = self
            .vectors
            .search(query, k)?
            .into_iter()
            .map(|(position, distance)| SearchHit {
                position,
                distance,
                chunk: self.chunks[position].clone(),
            })
            .collect();
        Ok(hits)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    #[inline]
    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    #[inline]
    pub fn vectors(&self) -> &FlatIndex {
        &self.vectors
    }

    /// Distinct document ids referenced by any chunk
    #[inline]
    pub fn document_ids(&self) -> BTreeSet<i64> {
        self.chunks.iter().filter_map(StoredChunk::document_id).collect()
    }

    /// Number of chunks that carry no document id
    #[inline]
    pub fn legacy_chunk_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.document_id().is_none())
            .count()
    }

    #[inline]
    pub fn into_chunks(self) -> Vec<StoredChunk> {
        self.chunks
    }
}
