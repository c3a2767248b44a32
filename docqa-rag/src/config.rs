//! Configuration for indexing and query serving.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::similarity::Similarity;

/// Configuration parameters shared by the index builder and the query service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results. `None` keeps every hit.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Upper bound on the joined context section of a prompt, in characters.
    pub max_context_chars: usize,
    /// Sampling temperature passed to the generator.
    pub temperature: f32,
    /// Number of chunk texts sent to the embedder per call during a build.
    pub embed_batch_size: usize,
    /// Similarity metric recorded in newly built indexes.
    pub metric: Similarity,
    /// Bound on each embedder and generator call while serving, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            similarity_threshold: None,
            max_context_chars: 4000,
            temperature: 0.2,
            embed_batch_size: 32,
            metric: Similarity::Cosine,
            request_timeout_secs: 60,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The per-call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `max_context_chars == 0`
    /// - `embed_batch_size == 0`
    /// - `request_timeout_secs == 0`
    /// - `temperature` is negative or not finite
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigurationError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigurationError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigurationError("top_k must be greater than zero".to_string()));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::ConfigurationError(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigurationError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RagError::ConfigurationError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(RagError::ConfigurationError(format!(
                "temperature ({}) must be a non-negative number",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the context budget for assembled prompts.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the generator sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the embedding batch size used during index builds.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the similarity metric for newly built indexes.
    pub fn metric(mut self, metric: Similarity) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the per-call timeout for the embedder and generator.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
