//! Deterministic in-process backends for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::{Completion, Generator};
use crate::rag::embeddings::Embedder;

const DIMENSIONS: usize = 64;

/// Hashes lower-cased words into a fixed-size bag-of-words vector, so texts
/// that share words score higher under cosine similarity.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    delay: Option<Duration>,
}

impl KeywordEmbedder {
    /// Sleeps before every batch, like a slow remote embedding backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let bucket = word
                .bytes()
                .fold(17usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % DIMENSIONS;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-hash"
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Returns a canned answer and remembers every prompt it was given.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    answer: String,
    delay: Option<Duration>,
    fail_with: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            anyhow::bail!("{}", message);
        }
        Ok(Completion {
            text: self.answer.clone(),
        })
    }
}
