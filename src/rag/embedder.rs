//! Text embedding collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::RagError;
use crate::core::config::EmbeddingSettings;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded on collections built with this embedder.
    fn model_id(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Client for OpenAI-compatible `/v1/embeddings` endpoints (Ollama,
/// LM Studio, llama.cpp server, hosted APIs).
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings, timeout: Duration) -> Result<Self, RagError> {
        if settings.model.trim().is_empty() {
            return Err(RagError::Configuration(
                "embedding.model must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::embedding)?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/embeddings", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            batch_size: settings.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: inputs,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(RagError::embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding endpoint returned {}: {}",
                status, text
            )));
        }

        let mut payload: EmbeddingResponse = res.json().await.map_err(RagError::embedding)?;
        payload.data.sort_by_key(|entry| entry.index);
        if payload.data.len() != inputs.len() {
            return Err(RagError::Embedding(format!(
                "endpoint returned {} embeddings for {} inputs",
                payload.data.len(),
                inputs.len()
            )));
        }

        Ok(payload.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        tracing::debug!(count = vectors.len(), model = %self.model, "embedded inputs");
        Ok(vectors)
    }
}

/// Deterministic bag-of-letters embedder for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub struct LetterEmbedder {
        pub model: String,
    }

    impl LetterEmbedder {
        pub fn new(model: &str) -> Self {
            Self {
                model: model.to_string(),
            }
        }
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_id(&self) -> &str {
            &self.model
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0f32; 26];
                    for c in text.to_lowercase().chars() {
                        if c.is_ascii_lowercase() {
                            vector[(c as u8 - b'a') as usize] += 1.0;
                        }
                    }
                    vector
                })
                .collect())
        }
    }
}
