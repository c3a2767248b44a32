//! Ollama-backed embedding provider and generator.
//!
//! This module is only available when the `ollama` feature is enabled.
//! Both types talk to a local Ollama server over its HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::http::{Call, endpoint, post_json};

/// The default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// The default embedding model (sentence-transformers all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// The dimensionality of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// The default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "phi3:mini";

const PROVIDER: &str = "Ollama";

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok().map(|e| e.error)
}

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new().with_model("nomic-embed-text", 768);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for [`DEFAULT_EMBEDDING_MODEL`] on [`DEFAULT_BASE_URL`].
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }

    /// Set the server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model and the dimensionality it produces.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = self.client.post(endpoint(&self.base_url, "api/embed"));
        let body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let parsed: EmbedResponse =
            post_json(request, &body, PROVIDER, Call::Embedding, error_detail).await?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!(
                    "expected {} embeddings, API returned {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            });
        }
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn identity(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

/// A [`Generator`] backed by Ollama's `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Create a generator for [`DEFAULT_GENERATION_MODEL`] on [`DEFAULT_BASE_URL`].
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
        }
    }

    /// Set the server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model name (e.g. `llama3.1:8b`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OllamaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let request = self.client.post(endpoint(&self.base_url, "api/generate"));
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };
        let parsed: GenerateResponse =
            post_json(request, &body, PROVIDER, Call::Generation, error_detail).await?;
        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
