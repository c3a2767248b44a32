//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while building, loading, or querying an index.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration detected at startup.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The index build received no chunks.
    #[error("Empty corpus: no chunks to index, nothing was written")]
    EmptyCorpus,

    /// No persisted index exists at the storage location.
    #[error("Index not found at '{}'", path.display())]
    IndexNotFound {
        /// The location that was checked.
        path: PathBuf,
    },

    /// The persisted index exists but is structurally invalid.
    #[error("Index at '{}' is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// The index file.
        path: PathBuf,
        /// What failed validation.
        message: String,
    },

    /// A vector's length disagrees with the index or embedder dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch {
        /// The dimension the index or embedder declares.
        expected: usize,
        /// The dimension that was observed.
        actual: usize,
    },

    /// The index was built by a different embedder than the one supplied.
    #[error("Embedder mismatch: index built with '{expected}', loaded with '{actual}'")]
    EmbedderMismatch {
        /// Identity recorded in the index header.
        expected: String,
        /// Identity of the embedder used for loading.
        actual: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model failed to produce an answer.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The query service was used before its index and models were loaded.
    #[error("Service not ready: index and model handles are not initialized")]
    ServiceNotReady,

    /// A call to an external model exceeded the request timeout.
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// The pipeline stage that timed out.
        stage: &'static str,
        /// The configured bound.
        after: Duration,
    },

    /// A document source could not be read.
    #[error("Loader error ({}): {message}", path.display())]
    LoaderError {
        /// The file or directory being loaded.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// File-system failure while persisting the index.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failure while persisting the index.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl RagError {
    /// Whether the error is scoped to a single request rather than the process.
    ///
    /// Request-scoped errors are reported back to the caller while the
    /// service keeps running.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingError { .. }
                | RagError::GenerationError { .. }
                | RagError::Timeout { .. }
                | RagError::EmbeddingDimensionMismatch { .. }
        )
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
