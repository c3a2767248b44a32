//! Top-k retrieval over a loaded [`VectorIndex`].

use std::sync::Arc;

use tracing::debug;

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Read-only nearest-neighbour search over a shared index.
///
/// Cloning is cheap and clones share the same index, so a `Retriever` can
/// be handed to concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    top_k: usize,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    /// Create a retriever returning `top_k` results by default.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if `top_k` is zero.
    pub fn new(index: Arc<VectorIndex>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::ConfigurationError("top_k must be greater than zero".to_string()));
        }
        Ok(Self { index, top_k, similarity_threshold: None })
    }

    /// Create a retriever with the `top_k` and threshold from `config`.
    pub fn from_config(index: Arc<VectorIndex>, config: &RagConfig) -> Result<Self> {
        let mut retriever = Self::new(index, config.top_k)?;
        retriever.similarity_threshold = config.similarity_threshold;
        Ok(retriever)
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// The default number of results.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The index searched by this retriever.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Retrieve the default number of results for `query_embedding`.
    pub fn retrieve(&self, query_embedding: &[f32]) -> Result<Vec<SearchResult>> {
        self.retrieve_k(query_embedding, self.top_k)
    }

    /// Retrieve up to `k` results for `query_embedding`, most similar first.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigurationError`] if `k` is zero
    /// - [`RagError::EmbeddingDimensionMismatch`] if the query vector does
    ///   not match the index
    pub fn retrieve_k(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigurationError("k must be greater than zero".to_string()));
        }
        let mut results = self.index.search(query_embedding, k)?;
        if let Some(threshold) = self.similarity_threshold {
            results.retain(|r| r.score >= threshold);
        }
        debug!(k, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
