//! Deterministic test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::{EmbeddingProvider, Generator, RagError, Result};

/// Hash-based embeddings: identical text always maps to the identical
/// L2-normalized vector, different text to an unrelated direction.
pub struct HashEmbedder {
    pub dimensions: usize,
    pub name: String,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, name: "test:hash".to_string(), calls: AtomicUsize::new(0) }
    }

    pub fn named(dimensions: usize, name: &str) -> Self {
        Self { name: name.to_string(), ..Self::new(dimensions) }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn identity(&self) -> String {
        self.name.clone()
    }
}

/// An embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "test".into(), message: "offline".into() })
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn identity(&self) -> String {
        "test:failing".to_string()
    }
}

/// Returns the same vector for every text.
pub struct ConstantEmbedder {
    pub vector: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    fn identity(&self) -> String {
        "test:constant".to_string()
    }
}

/// Sleeps far longer than any test timeout before embedding.
pub struct SlowEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![0.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn identity(&self) -> String {
        "test:hash".to_string()
    }
}

/// Returns a fixed answer and records every prompt it receives.
pub struct StubGenerator {
    pub answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn new(answer: &str) -> Self {
        Self { answer: answer.to_string(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Always fails with a generation error.
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(RagError::GenerationError { provider: "test".into(), message: "model crashed".into() })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Sleeps far longer than any test timeout before answering.
pub struct SlowGenerator;

#[async_trait]
impl Generator for SlowGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }

    fn name(&self) -> &str {
        "slow"
    }
}
