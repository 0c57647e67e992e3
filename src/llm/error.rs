use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation is not configured: {0}")]
    NotConfigured(String),
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },
    #[error("model or endpoint not found: {0}")]
    ModelNotFound(String),
    #[error("provider error ({kind}): {message}")]
    Provider { kind: String, message: String },
    #[error("malformed model response: {reason}")]
    MalformedResponse { preview: String, reason: String },
    #[error("generation timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::NotConfigured(_) => "not_configured",
            GenerationError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            GenerationError::ModelNotFound(_) => "model_not_found",
            GenerationError::Provider { .. } => "provider",
            GenerationError::MalformedResponse { .. } => "malformed_response",
            GenerationError::Timeout { .. } => "timeout",
        }
    }
}
