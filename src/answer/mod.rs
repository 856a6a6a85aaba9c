// Answer module
// Retrieval, prompting and source attribution for user questions


use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::completion::{CompletionProvider, SYSTEM_PROMPT, build_user_prompt};
use crate::index::{IndexManager, SearchHit};

pub const DEFAULT_TOP_K: usize = 4;

pub const NO_DOCUMENTS_MESSAGE: &str =
    "No documents have been uploaded yet. Please upload documents first.";
pub const NO_ANSWER_MESSAGE: &str = "I couldn't generate an answer.";
pub const EMPTY_QUESTION_MESSAGE: &str = "Please provide a question.";
pub const MISSING_SOURCE_PLACEHOLDER: &str = "Unknown document (re-upload to restore source)";

/// Minimal view of a stored document record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: i64,
    pub filename: String,
}

/// Resolves document ids to records when chunk metadata lacks a filename
#[async_trait]
pub trait DocumentLookup: Send + Sync {
    async fn lookup(&self, document_id: i64) -> Result<Option<DocumentRef>>;
}

/// Lookup that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

#[async_trait]
impl DocumentLookup for NoLookup {
    async fn lookup(&self, _document_id: i64) -> Result<Option<DocumentRef>> {
        Ok(None)
    }
}

/// Where a retrieved passage came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReference {
    pub document_id: Option<i64>,
    pub filename: String,
    pub text: String,
    pub chunk_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceReference>,
}

impl Answer {
    #[inline]
    pub fn message(text: &str) -> Self {
        Self {
            text: text.to_string(),
            sources: Vec::new(),
        }
    }
}

pub struct AnswerEngine {
    index: Arc<IndexManager>,
    completer: Arc<dyn CompletionProvider>,
    top_k: usize,
}

impl AnswerEngine {
    #[inline]
    pub fn new(
        index: Arc<IndexManager>,
        completer: Arc<dyn CompletionProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            completer,
            top_k: top_k.max(1),
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` from the indexed documents.
    ///
    /// Never fails: provider and index errors come back as an error message with
    /// no sources.
    #[inline]
    pub async fn answer(&self, question: &str, lookup: &dyn DocumentLookup) -> Answer {
        match self.try_answer(question, lookup).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Failed to answer question: {}", e);
                Answer::message(&format!("Error processing your question: {}", e))
            }
        }
    }

    /// Like [`answer`](Self::answer) but surfaces failures to the caller
    #[inline]
    pub async fn try_answer(&self, question: &str, lookup: &dyn DocumentLookup) -> Result<Answer> {
        let Some(hits) = self.index.search(question, self.top_k).await? else {
            debug!("Question asked with no index present");
            return Ok(Answer::message(NO_DOCUMENTS_MESSAGE));
        };

        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let user_prompt = build_user_prompt(&context, question);

        let completion = self.completer.complete(SYSTEM_PROMPT, &user_prompt).await?;
        let text = if completion.trim().is_empty() {
            warn!("Completion provider returned an empty answer");
            NO_ANSWER_MESSAGE.to_string()
        } else {
            completion
        };

        let sources = resolve_sources(&hits, lookup).await;
        info!(
            "Answered question using {} retrieved chunks",
            sources.len()
        );

        Ok(Answer { text, sources })
    }
}

/// Build one reference per hit, in ranked order.
///
/// Each missing filename triggers at most one lookup per document id; anything still
/// unresolved gets the placeholder.
async fn resolve_sources(hits: &[SearchHit], lookup: &dyn DocumentLookup) -> Vec<SourceReference> {
    let mut resolved: HashMap<i64, Option<String>> = HashMap::new();
    let mut sources = Vec::with_capacity(hits.len());

    for hit in hits {
        let chunk = &hit.chunk;
        let document_id = chunk.document_id();

        let filename = match (chunk.filename(), document_id) {
            (Some(filename), _) => Some(filename.to_string()),
            (None, Some(id)) => {
                if !resolved.contains_key(&id) {
                    let found = match lookup.lookup(id).await {
                        Ok(found) => found.map(|d| d.filename),
                        Err(e) => {
                            warn!("Failed to look up document {}: {}", id, e);
                            None
                        }
                    };
                    resolved.insert(id, found);
                }
                resolved.get(&id).cloned().flatten()
            }
            (None, None) => None,
        };

        sources.push(SourceReference {
            document_id,
            filename: filename.unwrap_or_else(|| MISSING_SOURCE_PLACEHOLDER.to_string()),
            text: chunk.text.clone(),
            chunk_index: chunk.chunk_index(),
        });
    }

    sources
}
