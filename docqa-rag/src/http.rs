//! JSON-over-HTTP plumbing shared by the model providers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{RagError, Result};

/// Which model call a request belongs to; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Embedding,
    Generation,
}

impl Call {
    pub(crate) fn error(self, provider: &str, message: String) -> RagError {
        let provider = provider.to_string();
        match self {
            Call::Embedding => RagError::EmbeddingError { provider, message },
            Call::Generation => RagError::GenerationError { provider, message },
        }
    }
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// POST `body` as JSON and decode a JSON reply.
///
/// Non-2xx replies become `call` errors; `detail` pulls the provider's
/// error message out of the body when it has a known shape.
pub(crate) async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    body: &B,
    provider: &str,
    call: Call,
    detail: fn(&str) -> Option<String>,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request.json(body).send().await.map_err(|e| {
        error!(provider, error = %e, "request failed");
        call.error(provider, format!("request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = detail(&text).unwrap_or(text);
        error!(provider, %status, %message, "API error");
        return Err(call.error(provider, format!("API returned {status}: {message}")));
    }

    response.json().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        call.error(provider, format!("failed to parse response: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(endpoint("http://host:1/", "api/embed"), "http://host:1/api/embed");
        assert_eq!(endpoint("http://host:1", "api/embed"), "http://host:1/api/embed");
    }

    #[test]
    fn call_selects_error_variant() {
        assert!(matches!(
            Call::Embedding.error("p", "m".into()),
            RagError::EmbeddingError { .. }
        ));
        assert!(matches!(
            Call::Generation.error("p", "m".into()),
            RagError::GenerationError { .. }
        ));
    }
}
