//! # docqa-rag
//!
//! Retrieval core for docqa: answering questions over a folder of documents.
//!
//! The offline path loads documents, splits them with a [`Chunker`], embeds
//! the chunks with an [`EmbeddingProvider`] and persists a [`VectorIndex`]
//! through the [`IndexBuilder`]. The online path loads that index once into
//! a [`ServiceContext`] and answers each question through the
//! [`QueryService`]: embed the question, [`Retriever`] top-k search,
//! [`PromptAssembler`] context assembly, then the [`Generator`].
//!
//! ## Features
//!
//! - `ollama` (default): [`ollama::OllamaEmbeddingProvider`] and [`ollama::OllamaGenerator`]
//! - `openai`: [`openai::OpenAIEmbeddingProvider`]

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod prompt;
pub mod retriever;
pub mod service;
pub mod similarity;

#[cfg(any(feature = "ollama", feature = "openai"))]
mod http;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::Generator;
pub use index::{IndexBuilder, IndexEntry, IndexHeader, VectorIndex};
pub use loader::{DirectoryLoader, DocumentLoader};
pub use prompt::{DEFAULT_TEMPLATE, Prompt, PromptAssembler};
pub use retriever::Retriever;
pub use service::{Answer, QueryService, QueryState, ServiceContext};
pub use similarity::Similarity;
