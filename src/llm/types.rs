use serde::{Deserialize, Serialize};

/// A rendered prompt pair plus its sampling temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f64,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f64) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

/// What a provider is asked to do for one attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// Ask the provider for a JSON-only response where it supports that.
    pub json_output: bool,
}

impl GenerationRequest {
    pub fn from_prompt(prompt: &Prompt, max_output_tokens: u32, json_output: bool) -> Self {
        Self {
            system: prompt.system.clone(),
            user: prompt.user.clone(),
            temperature: prompt.temperature,
            max_output_tokens,
            json_output,
        }
    }
}
