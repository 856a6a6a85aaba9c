// Document library
// Caller-facing operations over the record store, uploaded files and the vector index

#[cfg(test)]
mod tests;

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::answer::{Answer, AnswerEngine, EMPTY_QUESTION_MESSAGE};
use crate::completion::CompletionProvider;
use crate::config::Config;
use crate::database::{Database, Document, NewDocument};
use crate::embeddings::{EmbeddingProvider, OllamaClient};
use crate::extract::{DocumentFormat, process_document};
use crate::index::{ConsistencyReport, ConsistencyValidator, IndexManager, IndexStats, IndexStore};
use crate::{QaError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub document: Document,
    pub chunks_indexed: usize,
    /// Set when the document was stored but could not be indexed
    pub index_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub document: Document,
    pub chunks_removed: usize,
    pub index_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    pub documents_removed: u64,
    pub files_removed: usize,
    pub index_error: Option<String>,
}

pub struct DocumentLibrary {
    config: Config,
    database: Database,
    index: Arc<IndexManager>,
    engine: AnswerEngine,
}

impl DocumentLibrary {
    /// Open the library described by `config`, talking to Ollama for embeddings and answers
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(&config.ollama)?);
        Self::with_providers(config, client.clone(), client).await
    }

    #[inline]
    pub async fn with_providers(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| QaError::Config(e.to_string()))?;

        tokio::fs::create_dir_all(config.uploads_path()).await?;
        let database = Database::new(config.database_path())
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let index = Arc::new(IndexManager::new(
            IndexStore::new(config.vector_store_path()),
            embedder,
            config.chunking.clone(),
        ));
        let engine = AnswerEngine::new(Arc::clone(&index), completer, config.retrieval.top_k);

        debug!("Opened document library at {}", config.get_base_dir().display());
        Ok(Self {
            config,
            database,
            index,
            engine,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    /// Store a copy of `source`, record it, and index its text.
    ///
    /// Extraction failures undo the copy and fail the upload. Indexing failures are
    /// reported in the outcome without undoing the stored document.
    #[inline]
    pub async fn upload(&self, source: &Path) -> Result<UploadOutcome> {
        let format = DocumentFormat::from_path(source)?;
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                QaError::UnsupportedFileType(format!("Invalid file name: {}", source.display()))
            })?
            .to_string();

        if !tokio::fs::try_exists(source).await? {
            return Err(QaError::NotFound(format!(
                "File not found: {}",
                source.display()
            )));
        }

        let stored_path = self
            .config
            .uploads_path()
            .join(format!("{}_{}", Uuid::new_v4().simple(), filename));
        tokio::fs::copy(source, &stored_path).await?;
        debug!("Copied {} to {}", source.display(), stored_path.display());

        let text = match process_document(&stored_path, format).await {
            Ok(text) => text,
            Err(e) => {
                remove_file_if_present(&stored_path).await;
                return Err(e);
            }
        };

        let document = self
            .database
            .insert_document(&NewDocument {
                filename: filename.clone(),
                file_path: stored_path.to_string_lossy().into_owned(),
                file_type: format.content_type().to_string(),
            })
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let (chunks_indexed, index_error) =
            match self.index.add_document(&text, document.id, &filename).await {
                Ok(count) => (count, None),
                Err(e) => {
                    error!("Error adding document {} to vector store: {}", document.id, e);
                    (0, Some(e.to_string()))
                }
            };

        info!(
            "Uploaded {} as document {} ({} chunks)",
            filename, document.id, chunks_indexed
        );
        Ok(UploadOutcome {
            document,
            chunks_indexed,
            index_error,
        })
    }

    /// All documents, most recent first
    #[inline]
    pub async fn list(&self) -> Result<Vec<Document>> {
        self.database
            .list_documents()
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))
    }

    #[inline]
    pub async fn delete(&self, document_id: i64) -> Result<DeleteOutcome> {
        let document = self
            .database
            .get_document(document_id)
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?
            .ok_or_else(|| QaError::NotFound(format!("Document {} not found", document_id)))?;

        remove_file_if_present(Path::new(&document.file_path)).await;

        self.database
            .delete_document(document_id)
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let (chunks_removed, index_error) = match self.index.remove_document(document_id).await {
            Ok(stats) => (stats.removed, None),
            Err(e) => {
                error!("Error removing document {} from vector store: {}", document_id, e);
                (0, Some(e.to_string()))
            }
        };

        info!(
            "Deleted document {} ({}), {} chunks removed",
            document_id, document.filename, chunks_removed
        );
        Ok(DeleteOutcome {
            document,
            chunks_removed,
            index_error,
        })
    }

    /// Remove every uploaded file, record and indexed chunk
    #[inline]
    pub async fn clear_all(&self) -> Result<ClearOutcome> {
        let files_removed = clear_directory(&self.config.uploads_path()).await?;

        let documents_removed = self
            .database
            .delete_all_documents()
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let index_error = match self.index.clear_all().await {
            Ok(()) => None,
            Err(e) => {
                error!("Error clearing vector store: {}", e);
                Some(e.to_string())
            }
        };

        info!(
            "Cleared {} documents and {} uploaded files",
            documents_removed, files_removed
        );
        Ok(ClearOutcome {
            documents_removed,
            files_removed,
            index_error,
        })
    }

    /// Answer a question from the uploaded documents
    #[inline]
    pub async fn ask(&self, question: &str) -> Answer {
        if question.trim().is_empty() {
            return Answer::message(EMPTY_QUESTION_MESSAGE);
        }
        self.engine.answer(question, &self.database).await
    }

    #[inline]
    pub async fn index_stats(&self) -> Result<Option<IndexStats>> {
        self.index.stats().await
    }

    #[inline]
    pub async fn consistency_report(&self) -> Result<ConsistencyReport> {
        Ok(ConsistencyValidator::new(&self.database, &self.index)
            .validate_consistency()
            .await?)
    }

    /// Drop indexed chunks whose document record no longer exists
    #[inline]
    pub async fn cleanup_orphans(&self) -> Result<usize> {
        let validator = ConsistencyValidator::new(&self.database, &self.index);
        let report = validator.validate_consistency().await?;
        Ok(validator
            .cleanup_orphaned_documents(&report.orphaned_document_ids)
            .await?)
    }
}

async fn remove_file_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

async fn clear_directory(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
