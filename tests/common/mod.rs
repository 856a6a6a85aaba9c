#![allow(dead_code, reason = "each integration test binary uses a different subset")]

use async_trait::async_trait;
use doc_qa::completion::CompletionProvider;
use doc_qa::embeddings::EmbeddingProvider;
use doc_qa::{QaError, Result};

pub const DIMENSION: usize = 32;

/// Deterministic bag-of-words embedder
pub struct WordHashEmbedder;

impl WordHashEmbedder {
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(5381_u64, |h, b| h.wrapping_mul(33) ^ u64::from(b));
            vector[(hash % DIMENSION as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector_for(text))
    }
}

pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(QaError::Provider("connection refused".to_string()))
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(QaError::Provider("connection refused".to_string()))
    }
}

/// Completer that answers with the first line of the context it was given
pub struct FirstLineCompleter;

#[async_trait]
impl CompletionProvider for FirstLineCompleter {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        Ok(user_prompt
            .strip_prefix("Context: ")
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default()
            .to_string())
    }
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
