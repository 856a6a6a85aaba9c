// Deterministic stand-ins for the embedding and completion capabilities

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::completion::CompletionProvider;
use crate::embeddings::EmbeddingProvider;
use crate::{QaError, Result};

pub const TEST_DIMENSION: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into one of `TEST_DIMENSION` buckets
#[derive(Debug, Default)]
pub struct HashEmbedder {
    embedded_texts: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of chunk texts embedded so far
    pub fn embedded_texts(&self) -> usize {
        self.embedded_texts.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; TEST_DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % TEST_DIMENSION;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector_for(text))
    }
}

#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(QaError::Provider("embedding service unavailable".to_string()))
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(QaError::Provider("embedding service unavailable".to_string()))
    }
}

/// Returns a fixed reply and remembers the last prompts it was given
#[derive(Debug, Default)]
pub struct CannedCompleter {
    reply: String,
    last_prompts: Mutex<Option<(String, String)>>,
}

impl CannedCompleter {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_prompts: Mutex::new(None),
        }
    }

    pub fn last_prompts(&self) -> Option<(String, String)> {
        self.last_prompts
            .lock()
            .expect("prompt lock poisoned")
            .clone()
    }
}

#[async_trait]
impl CompletionProvider for CannedCompleter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        *self.last_prompts.lock().expect("prompt lock poisoned") =
            Some((system_prompt.to_string(), user_prompt.to_string()));
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Default)]
pub struct FailingCompleter;

#[async_trait]
impl CompletionProvider for FailingCompleter {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Err(QaError::Provider("completion service unavailable".to_string()))
    }
}
