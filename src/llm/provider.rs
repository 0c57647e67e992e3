use async_trait::async_trait;
use thiserror::Error;

use super::types::GenerationRequest;

/// A raw failure reported by a provider, before classification.
#[derive(Debug, Clone, Error)]
#[error("{kind} (status {status:?}): {message}")]
pub struct ProviderError {
    /// HTTP status when the failure came from a response.
    pub status: Option<u16>,
    /// Provider-specific error category, e.g. `RESOURCE_EXHAUSTED` or `transport`.
    pub kind: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn transport(err: reqwest::Error) -> Self {
        Self::new(
            err.status().map(|s| s.as_u16()),
            if err.is_timeout() { "timeout" } else { "transport" },
            err.to_string(),
        )
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "gemini", "openai_compatible")
    fn name(&self) -> &str;

    /// single non-streaming completion; returns the model's text
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}
