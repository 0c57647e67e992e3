use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{LlmProvider, ProviderError};
use super::types::GenerationRequest;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` REST client.
#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(base_url: Option<&str>, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            client: Client::new(),
        }
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let mut generation_config = json!({
            "temperature": request.temperature,
            "maxOutputTokens": request.max_output_tokens,
        });
        if request.json_output {
            if let Some(obj) = generation_config.as_object_mut() {
                obj.insert("responseMimeType".to_string(), json!("application/json"));
            }
        }

        json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.user }] }],
            "generationConfig": generation_config,
        })
    }

    fn response_text(payload: &Value) -> Option<String> {
        let parts = payload["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn error_from_body(status: u16, body: &str) -> ProviderError {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let kind = parsed
            .as_ref()
            .and_then(|v| v["error"]["status"].as_str())
            .unwrap_or("http_error")
            .to_string();
        let message = parsed
            .as_ref()
            .and_then(|v| v["error"]["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        ProviderError::new(Some(status), kind, message)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(Self::error_from_body(status.as_u16(), &text));
        }

        let payload: Value = res.json().await.map_err(ProviderError::transport)?;
        Self::response_text(&payload).ok_or_else(|| {
            let reason = payload["promptFeedback"]["blockReason"]
                .as_str()
                .or_else(|| payload["candidates"][0]["finishReason"].as_str())
                .unwrap_or("no candidates");
            ProviderError::new(None, "empty_response", reason.to_string())
        })
    }
}
