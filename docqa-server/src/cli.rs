//! Command-line arguments shared by the `docqa-server` and `docqa-index` binaries.
//!
//! Every flag can also be set through a `DOCQA_*` environment variable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, ValueEnum};
use docqa_rag::ollama::{self, OllamaEmbeddingProvider, OllamaGenerator};
use docqa_rag::{EmbeddingProvider, Generator, RagConfig, Similarity};

use crate::server::ServerConfig;
use crate::telemetry::LogFormat;

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// A local Ollama server.
    Ollama,
    /// The OpenAI embeddings API (reads `OPENAI_API_KEY`).
    Openai,
}

/// Similarity metric choices for newly built indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    Cosine,
    InnerProduct,
    Euclidean,
}

impl From<MetricArg> for Similarity {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Cosine => Similarity::Cosine,
            MetricArg::InnerProduct => Similarity::InnerProduct,
            MetricArg::Euclidean => Similarity::Euclidean,
        }
    }
}

/// Logging output options.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log output format.
    #[arg(long, env = "DOCQA_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Where the index lives and how the embedder is reached.
#[derive(Args, Debug, Clone)]
pub struct EmbedderArgs {
    /// Directory holding the persisted index.
    #[arg(long, env = "DOCQA_INDEX_DIR", default_value = "faiss_index")]
    pub index_dir: PathBuf,

    /// Embedding backend.
    #[arg(long, env = "DOCQA_EMBEDDER", value_enum, default_value = "ollama")]
    pub embedder: EmbedderKind,

    /// Base URL of the Ollama server.
    #[arg(long, env = "DOCQA_OLLAMA_URL", default_value = ollama::DEFAULT_BASE_URL)]
    pub ollama_url: String,

    /// Embedding model name. Defaults to the backend's default model.
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Dimensionality of the embedding model.
    #[arg(long, env = "DOCQA_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,
}

impl EmbedderArgs {
    /// Construct the configured embedding provider.
    pub fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        match self.embedder {
            EmbedderKind::Ollama => {
                let model = self
                    .embedding_model
                    .clone()
                    .unwrap_or_else(|| ollama::DEFAULT_EMBEDDING_MODEL.to_string());
                let dimensions =
                    self.embedding_dimensions.unwrap_or(ollama::DEFAULT_EMBEDDING_DIMENSIONS);
                Ok(Arc::new(
                    OllamaEmbeddingProvider::new()
                        .with_base_url(&self.ollama_url)
                        .with_model(model, dimensions),
                ))
            }
            #[cfg(feature = "openai")]
            EmbedderKind::Openai => {
                let mut provider = docqa_rag::openai::OpenAIEmbeddingProvider::from_env()
                    .context("failed to configure OpenAI embeddings")?;
                if let Some(model) = &self.embedding_model {
                    provider = provider.with_model(model);
                }
                if let Some(dimensions) = self.embedding_dimensions {
                    provider = provider.with_dimensions(dimensions);
                }
                Ok(Arc::new(provider))
            }
            #[cfg(not(feature = "openai"))]
            EmbedderKind::Openai => {
                anyhow::bail!("OpenAI embeddings require building with the `openai` feature")
            }
        }
    }
}

/// Retrieval and generation tuning.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Number of chunks retrieved per question.
    #[arg(long, env = "DOCQA_TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// Drop retrieved chunks scoring below this value.
    #[arg(long, env = "DOCQA_SIMILARITY_THRESHOLD")]
    pub similarity_threshold: Option<f32>,

    /// Character budget for the context section of the prompt.
    #[arg(long, env = "DOCQA_MAX_CONTEXT_CHARS", default_value_t = 4000)]
    pub max_context_chars: usize,

    /// Generator sampling temperature.
    #[arg(long, env = "DOCQA_TEMPERATURE", default_value_t = 0.2)]
    pub temperature: f32,

    /// Timeout for each embedder and generator call, in seconds.
    #[arg(long, env = "DOCQA_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Generation model served by Ollama.
    #[arg(long, env = "DOCQA_GENERATION_MODEL", default_value = ollama::DEFAULT_GENERATION_MODEL)]
    pub generation_model: String,
}

/// `docqa-server`: answer questions over HTTP from a prebuilt index.
#[derive(Parser, Debug)]
#[command(name = "docqa-server", version, about = "Serve answers grounded in an indexed document folder")]
pub struct ServeCli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "DOCQA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "DOCQA_PORT", default_value_t = 5000)]
    pub port: u16,

    #[command(flatten)]
    pub embedder: EmbedderArgs,

    #[command(flatten)]
    pub query: QueryArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

impl ServeCli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig { host: self.host.clone(), port: self.port }
    }

    /// Build the validated query-time configuration.
    pub fn rag_config(&self) -> anyhow::Result<RagConfig> {
        let mut builder = RagConfig::builder()
            .top_k(self.query.top_k)
            .max_context_chars(self.query.max_context_chars)
            .temperature(self.query.temperature)
            .request_timeout(Duration::from_secs(self.query.request_timeout_secs));
        if let Some(threshold) = self.query.similarity_threshold {
            builder = builder.similarity_threshold(threshold);
        }
        builder.build().context("invalid query configuration")
    }

    pub fn generator(&self) -> Arc<dyn Generator> {
        Arc::new(
            OllamaGenerator::new()
                .with_base_url(&self.embedder.ollama_url)
                .with_model(&self.query.generation_model),
        )
    }
}

/// `docqa-index`: chunk and embed a document folder into a persisted index.
#[derive(Parser, Debug)]
#[command(name = "docqa-index", version, about = "Build the vector index for a document folder")]
pub struct IndexCli {
    /// Folder of source documents.
    #[arg(long, env = "DOCQA_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// File extensions to load, comma separated.
    #[arg(long, env = "DOCQA_EXTENSIONS", value_delimiter = ',', default_value = "pdf,txt,md")]
    pub extensions: Vec<String>,

    /// `pdftotext` executable used to read PDFs.
    #[arg(long, env = "DOCQA_PDFTOTEXT", default_value = docqa_rag::loader::DEFAULT_PDFTOTEXT)]
    pub pdftotext: PathBuf,

    /// Maximum chunk size in characters.
    #[arg(long, env = "DOCQA_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Chunk texts sent per embedder call.
    #[arg(long, env = "DOCQA_EMBED_BATCH_SIZE", default_value_t = 32)]
    pub embed_batch_size: usize,

    /// Similarity metric recorded in the index.
    #[arg(long, env = "DOCQA_METRIC", value_enum, default_value = "cosine")]
    pub metric: MetricArg,

    #[command(flatten)]
    pub embedder: EmbedderArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

impl IndexCli {
    /// Build the validated build-time configuration.
    pub fn rag_config(&self) -> anyhow::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .embed_batch_size(self.embed_batch_size)
            .metric(self.metric.into())
            .build()
            .context("invalid index configuration")
    }
}
