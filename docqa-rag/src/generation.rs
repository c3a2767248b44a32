//! Generator trait for answer synthesis.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that turns an assembled prompt into an answer.
///
/// Failures are reported as [`RagError::GenerationError`](crate::RagError::GenerationError).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a free-text completion for `prompt`.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// A short name for logs and error messages.
    fn name(&self) -> &str;
}
