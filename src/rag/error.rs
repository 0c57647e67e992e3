use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid RAG configuration: {0}")]
    Configuration(String),
    #[error("source document not found: {0}")]
    SourceNotFound(String),
    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    Store(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("collection '{collection}' was built with '{indexed}', current model is '{current}'")]
    ModelMismatch {
        collection: String,
        indexed: String,
        current: String,
    },
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
}

impl RagError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::Store(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }
}
