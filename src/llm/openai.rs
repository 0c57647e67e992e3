use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{LlmProvider, ProviderError};
use super::types::GenerationRequest;

/// Chat-completions client for OpenAI-compatible servers (LM Studio,
/// llama.cpp server, Ollama, hosted APIs).
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
            "stream": false,
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let res = builder.send().await.map_err(ProviderError::transport)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let kind = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["type"].as_str().map(str::to_string))
                .unwrap_or_else(|| "http_error".to_string());
            return Err(ProviderError::new(Some(status.as_u16()), kind, text));
        }

        let payload: Value = res.json().await.map_err(ProviderError::transport)?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new(None, "empty_response", "no message content"))
    }
}
