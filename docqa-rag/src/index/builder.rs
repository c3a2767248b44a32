use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::{IndexEntry, VectorIndex, is_finite, storage};
use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::similarity::Similarity;

/// Embeds chunks and persists them as a [`VectorIndex`].
///
/// Builds are all-or-nothing: nothing is written unless every chunk was
/// embedded successfully, and an empty chunk sequence is rejected with
/// [`RagError::EmptyCorpus`] before the storage location is touched.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{IndexBuilder, RagConfig};
///
/// let builder = IndexBuilder::from_config(embedder, "faiss_index", &RagConfig::default());
/// let index = builder.build(chunks).await?;
/// ```
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    location: PathBuf,
    metric: Similarity,
    batch_size: usize,
}

impl IndexBuilder {
    /// Create a builder writing to `location` with cosine similarity.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, location: impl Into<PathBuf>) -> Self {
        Self { embedder, location: location.into(), metric: Similarity::Cosine, batch_size: 32 }
    }

    /// Create a builder using the metric and batch size from `config`.
    pub fn from_config(
        embedder: Arc<dyn EmbeddingProvider>,
        location: impl Into<PathBuf>,
        config: &RagConfig,
    ) -> Self {
        Self::new(embedder, location)
            .with_metric(config.metric)
            .with_batch_size(config.embed_batch_size)
    }

    /// Set the similarity metric recorded in the index.
    pub fn with_metric(mut self, metric: Similarity) -> Self {
        self.metric = metric;
        self
    }

    /// Set how many chunks are embedded per embedder call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The storage location this builder writes to.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Embed every chunk and assemble an in-memory index without persisting it.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if `chunks` is empty
    /// - [`RagError::EmbeddingError`] if the embedder fails or returns the
    ///   wrong number of vectors
    /// - [`RagError::EmbeddingDimensionMismatch`] if a vector's length differs
    ///   from the embedder's declared dimension
    /// - [`RagError::EmbeddingError`] if a vector holds NaN or infinity
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<VectorIndex> {
        if chunks.is_empty() {
            error!(location = %self.location.display(), "refusing to build an empty index");
            return Err(RagError::EmptyCorpus);
        }

        let dimensions = self.embedder.dimensions();
        let identity = self.embedder.identity();
        let total = chunks.len();
        let mut entries = Vec::with_capacity(total);

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
                error!(embedder = %identity, error = %e, "embedding failed during build");
                e
            })?;
            if embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: identity,
                    message: format!(
                        "expected {} embeddings, received {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != dimensions {
                    return Err(RagError::EmbeddingDimensionMismatch {
                        expected: dimensions,
                        actual: embedding.len(),
                    });
                }
                if !is_finite(&embedding) {
                    error!(embedder = %identity, chunk = %chunk.id, "non-finite embedding");
                    return Err(RagError::EmbeddingError {
                        provider: identity,
                        message: format!("embedding for chunk {} has non-finite components", chunk.id),
                    });
                }
                entries.push(IndexEntry { chunk: chunk.clone(), embedding });
            }
            debug!(embedded = entries.len(), total, "embedded batch");
        }

        VectorIndex::new(identity, dimensions, self.metric, entries)
    }

    /// Embed every chunk and persist the index, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Any error from [`embed_chunks`](Self::embed_chunks) or
    /// [`storage::save`]. The previous index is untouched on error.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<VectorIndex> {
        let index = self.embed_chunks(chunks).await?;
        storage::save(&index, &self.location)?;
        info!(
            location = %self.location.display(),
            entry_count = index.len(),
            embedder = %index.header().embedder,
            "index build complete"
        );
        Ok(index)
    }

    /// Chunk `documents` and build the index from the result.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build). Documents that produce no chunks count
    /// towards an [`RagError::EmptyCorpus`].
    pub async fn build_from_documents(
        &self,
        chunker: &dyn Chunker,
        documents: &[Document],
    ) -> Result<VectorIndex> {
        let chunks = chunker.chunk_all(documents);
        info!(document_count = documents.len(), chunk_count = chunks.len(), "chunked documents");
        self.build(chunks).await
    }
}
