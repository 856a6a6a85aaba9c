// Cross-store consistency validation
// Compares document ids referenced by the vector index with the record store


use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use super::IndexManager;
use crate::database::Database;

/// Consistency check results between the record store and the vector index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsistencyReport {
    /// Number of chunks in the vector index
    pub indexed_chunks: usize,
    /// Chunks with no document id at all
    pub legacy_chunks: usize,
    /// Number of document records
    pub documents: usize,
    /// Document ids present in the index but missing from the record store
    pub orphaned_document_ids: Vec<i64>,
    /// Document records with no chunks in the index
    pub unindexed_documents: Vec<i64>,
    pub is_consistent: bool,
}

pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    index: &'a IndexManager,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, index: &'a IndexManager) -> Self {
        Self { database, index }
    }

    #[inline]
    pub async fn validate_consistency(&self) -> Result<ConsistencyReport> {
        info!("Starting index consistency validation");

        let record_ids: BTreeSet<i64> = self
            .database
            .list_documents()
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        debug!("Found {} document records", record_ids.len());

        let (indexed_chunks, legacy_chunks, indexed_ids) = match self.index.load().await? {
            Some(index) => (index.len(), index.legacy_chunk_count(), index.document_ids()),
            None => (0, 0, BTreeSet::new()),
        };
        debug!(
            "Found {} chunks covering {} documents in the index",
            indexed_chunks,
            indexed_ids.len()
        );

        let orphaned_document_ids: Vec<i64> =
            indexed_ids.difference(&record_ids).copied().collect();
        let unindexed_documents: Vec<i64> =
            record_ids.difference(&indexed_ids).copied().collect();
        let is_consistent = orphaned_document_ids.is_empty() && unindexed_documents.is_empty();

        let report = ConsistencyReport {
            indexed_chunks,
            legacy_chunks,
            documents: record_ids.len(),
            orphaned_document_ids,
            unindexed_documents,
            is_consistent,
        };

        if report.is_consistent {
            info!("Index consistency validation passed");
        } else {
            warn!(
                "Index consistency validation found {} orphaned and {} unindexed documents",
                report.orphaned_document_ids.len(),
                report.unindexed_documents.len()
            );
        }

        Ok(report)
    }

    /// Remove the chunks of documents that no longer have a record
    #[inline]
    pub async fn cleanup_orphaned_documents(&self, document_ids: &[i64]) -> Result<usize> {
        if document_ids.is_empty() {
            return Ok(0);
        }

        info!("Cleaning up {} orphaned documents from the index", document_ids.len());

        let mut cleaned = 0;
        for &document_id in document_ids {
            match self.index.remove_document(document_id).await {
                Ok(stats) if stats.removed > 0 => {
                    cleaned += 1;
                    debug!(
                        "Removed {} orphaned chunks of document {}",
                        stats.removed, document_id
                    );
                }
                Ok(_) => {
                    warn!("Orphaned document {} had no chunks to remove", document_id);
                }
                Err(e) => {
                    error!("Failed to remove orphaned document {}: {}", document_id, e);
                }
            }
        }

        info!("Cleaned up {} orphaned documents", cleaned);
        Ok(cleaned)
    }
}
