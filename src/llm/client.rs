//! GenerationClient: provider calls with retry/backoff and typed parsing.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use super::error::GenerationError;
use super::gemini::GeminiProvider;
use super::openai::OpenAiCompatibleProvider;
use super::provider::{LlmProvider, ProviderError};
use super::schema::{self, GeneratedStrategy, SchemaKind, Solution, Strategy, StrategyEnvelope};
use super::types::{GenerationRequest, Prompt};
use crate::core::config::{GenerationSettings, ProviderKind};

/// Strategies kept from one response.
pub const MAX_STRATEGIES: usize = 3;
const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub enum ParsedResult {
    Strategies(Vec<Strategy>),
    Solution(Solution),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one, for rate-limit failures only.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            factor: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    RateLimited,
    NotFound,
    Other,
}

fn rate_limit_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?i)\bquota\b|\brate(?:[ _-]?limit(?:ed|s)?)?\b",
                r"|resource_exhausted|too many requests",
            ))
            .ok()
        })
        .as_ref()
}

fn classify(err: &ProviderError) -> FailureClass {
    if err.status == Some(429) {
        return FailureClass::RateLimited;
    }
    let text = format!("{} {}", err.kind, err.message);
    if rate_limit_pattern().is_some_and(|pattern| pattern.is_match(&text)) {
        return FailureClass::RateLimited;
    }
    if err.status == Some(404) || text.to_lowercase().contains("not found") {
        return FailureClass::NotFound;
    }
    FailureClass::Other
}

/// Removes a leading ```` ``` ```` fence (with or without a language tag)
/// and a trailing one.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

fn malformed(raw: &str, reason: impl Into<String>) -> GenerationError {
    GenerationError::MalformedResponse {
        preview: preview(raw),
        reason: reason.into(),
    }
}

pub struct GenerationClient {
    provider: Option<Arc<dyn LlmProvider>>,
    retry: RetryPolicy,
    timeout: Duration,
    max_output_tokens: u32,
}

impl GenerationClient {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        retry: RetryPolicy,
        timeout: Duration,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            provider,
            retry,
            timeout,
            max_output_tokens,
        }
    }

    /// Builds the configured provider; an unconfigured provider is not an
    /// error, every call then fails with `NotConfigured`.
    pub fn from_settings(settings: &GenerationSettings, timeout: Duration) -> Self {
        let provider: Option<Arc<dyn LlmProvider>> = match settings.provider {
            ProviderKind::Gemini => settings.credential().map(|key| {
                Arc::new(GeminiProvider::new(
                    settings.base_url.as_deref(),
                    key.to_string(),
                    settings.model.clone(),
                )) as Arc<dyn LlmProvider>
            }),
            ProviderKind::OpenAiCompatible => settings.base_url.as_ref().map(|base_url| {
                Arc::new(OpenAiCompatibleProvider::new(
                    base_url.clone(),
                    settings.credential().map(str::to_string),
                    settings.model.clone(),
                )) as Arc<dyn LlmProvider>
            }),
        };

        match &provider {
            Some(p) => tracing::info!(
                provider = p.name(),
                model = %settings.model,
                "Generation provider configured"
            ),
            None => tracing::warn!(
                "No generation credential configured; fallback strategies will be used"
            ),
        }

        Self::new(
            provider,
            RetryPolicy {
                max_retries: settings.max_retries,
                initial_delay: settings.initial_backoff,
                factor: 2,
            },
            timeout,
            settings.max_output_tokens,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub async fn generate(
        &self,
        prompt: &Prompt,
        kind: SchemaKind,
    ) -> Result<ParsedResult, GenerationError> {
        let request = GenerationRequest::from_prompt(prompt, self.max_output_tokens, true);
        let raw = self.call_with_retry(&request).await?;
        parse_response(&raw, kind)
    }

    pub async fn generate_strategies(
        &self,
        prompt: &Prompt,
    ) -> Result<Vec<Strategy>, GenerationError> {
        match self.generate(prompt, SchemaKind::Strategies).await? {
            ParsedResult::Strategies(strategies) => Ok(strategies),
            ParsedResult::Solution(_) => Err(malformed("", "expected strategies")),
        }
    }

    pub async fn generate_solution(&self, prompt: &Prompt) -> Result<Solution, GenerationError> {
        match self.generate(prompt, SchemaKind::Solution).await? {
            ParsedResult::Solution(solution) => Ok(solution),
            ParsedResult::Strategies(_) => Err(malformed("", "expected a solution")),
        }
    }

    /// One plain-text attempt without retries.
    pub async fn complete_text(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let provider = self.provider()?;
        let request = GenerationRequest::from_prompt(prompt, self.max_output_tokens, false);
        let text = match tokio::time::timeout(self.timeout, provider.generate(&request)).await {
            Ok(result) => result.map_err(|err| GenerationError::Provider {
                kind: err.kind,
                message: err.message,
            })?,
            Err(_) => {
                return Err(GenerationError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };
        Ok(text.trim().to_string())
    }

    fn provider(&self) -> Result<&Arc<dyn LlmProvider>, GenerationError> {
        self.provider.as_ref().ok_or_else(|| {
            GenerationError::NotConfigured("no generation API key or endpoint set".to_string())
        })
    }

    async fn call_with_retry(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let provider = self.provider()?;
        let mut delay = self.retry.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(self.timeout, provider.generate(request)).await;
            let err = match outcome {
                Ok(Ok(text)) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Generation succeeded after retry");
                    }
                    return Ok(text);
                }
                Ok(Err(err)) => err,
                Err(_) => {
                    tracing::warn!(
                        attempt,
                        timeout_secs = self.timeout.as_secs(),
                        "Generation timed out"
                    );
                    return Err(GenerationError::Timeout {
                        secs: self.timeout.as_secs(),
                    });
                }
            };

            match classify(&err) {
                FailureClass::RateLimited => {
                    if attempt > self.retry.max_retries {
                        tracing::error!(attempts = attempt, "Rate limit persisted after retries");
                        return Err(GenerationError::RateLimitExceeded { attempts: attempt });
                    }
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited by {}, backing off",
                        provider.name()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= self.retry.factor;
                }
                FailureClass::NotFound => {
                    tracing::error!(
                        kind = %err.kind,
                        "Model or endpoint not found: {}",
                        err.message
                    );
                    return Err(GenerationError::ModelNotFound(err.message));
                }
                FailureClass::Other => {
                    tracing::error!(
                        kind = %err.kind,
                        status = ?err.status,
                        "Generation failed: {}",
                        err.message
                    );
                    return Err(GenerationError::Provider {
                        kind: err.kind,
                        message: err.message,
                    });
                }
            }
        }
    }
}

/// Unwraps fences, parses JSON, validates the schema and fills local fields.
pub fn parse_response(raw: &str, kind: SchemaKind) -> Result<ParsedResult, GenerationError> {
    let body = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|err| malformed(raw, format!("invalid JSON: {err}")))?;
    let value = schema::normalize(kind, value);
    schema::validate(kind, &value).map_err(|reason| malformed(raw, reason))?;

    match kind {
        SchemaKind::Strategies => {
            let envelope: StrategyEnvelope = serde_json::from_value(value)
                .map_err(|err| malformed(raw, err.to_string()))?;
            if envelope.strategies.len() > MAX_STRATEGIES {
                tracing::debug!(
                    returned = envelope.strategies.len(),
                    "Truncating extra strategies"
                );
            }
            let strategies = envelope
                .strategies
                .into_iter()
                .take(MAX_STRATEGIES)
                .zip(1u32..)
                .map(|(generated, id): (GeneratedStrategy, u32)| {
                    Strategy::from_generated(id, generated)
                })
                .collect();
            Ok(ParsedResult::Strategies(strategies))
        }
        SchemaKind::Solution => serde_json::from_value(value)
            .map(ParsedResult::Solution)
            .map_err(|err| malformed(raw, err.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Provider that replays scripted outcomes and counts calls.
    pub struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
        pub calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        pub fn new(outcomes: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        pub fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ProviderError::new(None, "exhausted", "no scripted outcome"))
                })
        }
    }

    pub fn strategies_json(count: usize) -> String {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "id": 99,
                    "title": format!("Strategy {}", i + 1),
                    "title_hi": format!("रणनीति {}", i + 1),
                    "time_minutes": 2,
                    "difficulty": "easy",
                    "steps": ["Do this", "Then that"],
                    "materials": [],
                    "ncf_alignment": "Play-based",
                    "success_count": 500,
                    "video_url": "https://example.com"
                })
            })
            .collect();
        serde_json::json!({ "strategies": items }).to_string()
    }

    pub fn rate_limited() -> Result<String, ProviderError> {
        Err(ProviderError::new(Some(429), "RESOURCE_EXHAUSTED", "Quota exceeded"))
    }
}
