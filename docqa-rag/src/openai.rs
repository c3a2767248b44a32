//! Embeddings from the OpenAI API or any server that speaks its `/embeddings` route.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{Call, endpoint, post_json};

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// The dimensionality of [`DEFAULT_MODEL`].
pub const DEFAULT_DIMENSIONS: usize = 1536;

const PROVIDER: &str = "OpenAI";

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Deserialize)]
struct ApiErrorMessage {
    message: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body).ok().map(|e| e.error.message)
}

/// An [`EmbeddingProvider`] for OpenAI-compatible embedding endpoints.
///
/// Setting [`with_dimensions`](Self::with_dimensions) asks the API for
/// shortened vectors; the requested size becomes part of the
/// [`identity`](EmbeddingProvider::identity), so an index built at one size
/// refuses to load with another.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    shortened: bool,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for [`DEFAULT_MODEL`] with the given API key.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if `api_key` is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigurationError("OpenAI API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            shortened: false,
        })
    }

    /// Create a provider from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::ConfigurationError("OPENAI_API_KEY environment variable not set".into())
        })?;
        Self::new(api_key)
    }

    /// Target another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use another model. Its native dimensionality must be declared with
    /// [`with_dimensions`](Self::with_dimensions) unless it is 1536.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request vectors of `dimensions` components.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self.shortened = true;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text]).await?.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request =
            self.client.post(endpoint(&self.base_url, "embeddings")).bearer_auth(&self.api_key);
        let body = EmbeddingsBody {
            model: &self.model,
            input: texts,
            dimensions: self.shortened.then_some(self.dimensions),
        };
        let reply: EmbeddingsReply =
            post_json(request, &body, PROVIDER, Call::Embedding, error_detail).await?;

        // Items may arrive out of order; `index` refers to the input position.
        let mut items = reply.data;
        items.sort_by_key(|item| item.index);
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn identity(&self) -> String {
        if self.shortened {
            format!("openai:{}@{}", self.model, self.dimensions)
        } else {
            format!("openai:{}", self.model)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_a_configuration_error() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new("  "),
            Err(RagError::ConfigurationError(_))
        ));
    }

    #[test]
    fn identity_tracks_requested_dimensions() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap();
        assert_eq!(provider.identity(), "openai:text-embedding-3-small");
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);

        let provider = provider.with_dimensions(256);
        assert_eq!(provider.identity(), "openai:text-embedding-3-small@256");
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn body_omits_dimensions_unless_requested() {
        let texts = ["a", "b"];
        let body = EmbeddingsBody { model: "m", input: &texts, dimensions: None };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("dimensions").is_none());
        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn error_detail_reads_nested_message() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error"}}"#;
        assert_eq!(error_detail(body).as_deref(), Some("Incorrect API key"));
    }
}
