//! Query orchestration: embed → retrieve → assemble → generate.
//!
//! A [`ServiceContext`] holds everything loaded once at startup (the index,
//! the embedder and the generator). A [`QueryService`] owns a write-once
//! slot for that context and answers questions once it is filled.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{QueryService, RagConfig, ServiceContext};
//!
//! let service = QueryService::new();
//! let context = ServiceContext::load("faiss_index", embedder, generator, RagConfig::default())?;
//! service.initialize(context)?;
//! let answer = service.ask("What is the capital of France?").await?;
//! ```

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::{VectorIndex, storage};
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;

/// Stages a single question moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    /// The question was accepted.
    Received,
    /// The question is being embedded.
    Embedding,
    /// The index is being searched.
    Retrieving,
    /// The prompt is being built.
    Assembling,
    /// The generator is producing the answer.
    Generating,
    /// An answer was produced.
    Done,
    /// A stage failed.
    Failed,
}

impl QueryState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryState::Done | QueryState::Failed)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryState::Received => "received",
            QueryState::Embedding => "embedding",
            QueryState::Retrieving => "retrieving",
            QueryState::Assembling => "assembling",
            QueryState::Generating => "generating",
            QueryState::Done => "done",
            QueryState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The answer to one question along with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Identifier used in the logs for this request.
    pub request_id: Uuid,
    /// The generator's output, unmodified.
    pub answer: String,
    /// The retrieved chunks that were placed in the prompt, best first.
    pub sources: Vec<SearchResult>,
}

/// Handles loaded once per process and shared by every request.
pub struct ServiceContext {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    retriever: Retriever,
    assembler: PromptAssembler,
    config: RagConfig,
}

impl ServiceContext {
    /// Assemble a context around an already-loaded index.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigurationError`] if `config` is invalid
    /// - [`RagError::EmbeddingDimensionMismatch`] or
    ///   [`RagError::EmbedderMismatch`] if `embedder` did not build `index`
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        config: RagConfig,
    ) -> Result<Self> {
        config.validate()?;

        let header = index.header();
        if header.dimensions != embedder.dimensions() {
            return Err(RagError::EmbeddingDimensionMismatch {
                expected: header.dimensions,
                actual: embedder.dimensions(),
            });
        }
        if header.embedder != embedder.identity() {
            return Err(RagError::EmbedderMismatch {
                expected: header.embedder.clone(),
                actual: embedder.identity(),
            });
        }

        let retriever = Retriever::from_config(index, &config)?;
        let assembler = PromptAssembler::from_config(&config);
        Ok(Self { embedder, generator, retriever, assembler, config })
    }

    /// Load the index at `location` and assemble a context around it.
    ///
    /// # Errors
    ///
    /// Any error from [`storage::load`] or [`ServiceContext::new`].
    pub fn load(
        location: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        config: RagConfig,
    ) -> Result<Self> {
        config.validate()?;
        let index = storage::load(location.as_ref(), embedder.as_ref())?;
        Self::new(Arc::new(index), embedder, generator, config)
    }

    /// Replace the prompt assembler, e.g. to use a custom template.
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// The loaded index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        self.retriever.index()
    }

    /// The active configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}

/// Tracks the state of one question and logs every transition.
struct QueryRun {
    id: Uuid,
    state: QueryState,
}

impl QueryRun {
    fn start() -> Self {
        let run = Self { id: Uuid::new_v4(), state: QueryState::Received };
        debug!(request_id = %run.id, state = %run.state, "query state");
        run
    }

    fn advance(&mut self, next: QueryState) {
        debug!(request_id = %self.id, from = %self.state, to = %next, "query state");
        self.state = next;
    }

    fn fail(&mut self, error: RagError) -> RagError {
        warn!(request_id = %self.id, stage = %self.state, error = %error, "query failed");
        self.state = QueryState::Failed;
        error
    }
}

/// Answers questions against a [`ServiceContext`] once it has been installed.
#[derive(Default)]
pub struct QueryService {
    context: OnceCell<Arc<ServiceContext>>,
}

impl QueryService {
    /// Create a service that is not yet ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service that is ready immediately.
    pub fn ready(context: ServiceContext) -> Self {
        Self { context: OnceCell::new_with(Some(Arc::new(context))) }
    }

    /// Install the context. Startup is one-time: a second call fails.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if the service was already
    /// initialized.
    pub fn initialize(&self, context: ServiceContext) -> Result<()> {
        let entry_count = context.index().len();
        self.context.set(Arc::new(context)).map_err(|_| {
            RagError::ConfigurationError("query service is already initialized".to_string())
        })?;
        info!(entry_count, "query service ready");
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_ready(&self) -> bool {
        self.context.initialized()
    }

    /// The installed context, if any.
    pub fn context(&self) -> Option<&Arc<ServiceContext>> {
        self.context.get()
    }

    /// Answer `question` from the indexed corpus.
    ///
    /// # Errors
    ///
    /// - [`RagError::ServiceNotReady`] before initialization
    /// - [`RagError::EmbeddingError`], [`RagError::GenerationError`] or
    ///   [`RagError::Timeout`] from the model calls
    /// - [`RagError::EmbeddingDimensionMismatch`] if the query vector does
    ///   not fit the index
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let context = self.context.get().ok_or(RagError::ServiceNotReady)?;
        let mut run = QueryRun::start();
        let timeout = context.config.request_timeout();

        run.advance(QueryState::Embedding);
        let query_embedding =
            match bounded("embedding", timeout, context.embedder.embed(question)).await {
                Ok(embedding) => embedding,
                Err(e) => return Err(run.fail(e)),
            };

        run.advance(QueryState::Retrieving);
        let results = match context.retriever.retrieve(&query_embedding) {
            Ok(results) => results,
            Err(e) => return Err(run.fail(e)),
        };

        run.advance(QueryState::Assembling);
        let prompt = context.assembler.assemble(question, &results);
        debug!(
            request_id = %run.id,
            included = prompt.included(),
            dropped = prompt.dropped,
            prompt_chars = prompt.text.len(),
            "assembled prompt"
        );

        run.advance(QueryState::Generating);
        let generated = context.generator.generate(&prompt.text, context.config.temperature);
        let answer = match bounded("generation", timeout, generated).await {
            Ok(answer) => answer,
            Err(e) => return Err(run.fail(e)),
        };

        run.advance(QueryState::Done);
        info!(
            request_id = %run.id,
            sources = prompt.included(),
            generator = context.generator.name(),
            "answered question"
        );

        let sources = prompt.kept.iter().map(|&i| results[i].clone()).collect();
        Ok(Answer { request_id: run.id, answer, sources })
    }
}

/// Run `call` with a deadline; dropping the future on expiry cancels it.
async fn bounded<T>(
    stage: &'static str,
    after: std::time::Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, call).await.map_err(|_| RagError::Timeout { stage, after })?
}
