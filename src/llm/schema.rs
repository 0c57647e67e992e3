//! Output contracts for model responses.
//!
//! Wire types describe exactly what the model is asked to emit; their JSON
//! Schemas (derived with `schemars`) gate every parsed response before it
//! is turned into domain values.

use std::sync::OnceLock;

use jsonschema::Validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One strategy as the model emits it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedStrategy {
    pub title: String,
    pub title_hi: String,
    pub time_minutes: u32,
    pub difficulty: Difficulty,
    pub steps: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub ncf_alignment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StrategyEnvelope {
    pub strategies: Vec<GeneratedStrategy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SolutionStep {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Solution {
    pub solution_markdown: String,
    pub steps: Vec<SolutionStep>,
    pub concept_explanation: String,
    pub difficulty_level: String,
    pub detected_subject: String,
}

/// A strategy as returned to callers. `id`, `success_count` and `video_url`
/// are always filled locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: u32,
    pub title: String,
    #[serde(rename = "title_hi")]
    pub title_localized: String,
    pub time_minutes: u32,
    pub difficulty: Difficulty,
    pub steps: Vec<String>,
    pub materials: Vec<String>,
    pub ncf_alignment: String,
    pub success_count: u32,
    pub video_url: Option<String>,
}

impl Strategy {
    pub fn from_generated(id: u32, generated: GeneratedStrategy) -> Self {
        Self {
            id,
            title: generated.title,
            title_localized: generated.title_hi,
            time_minutes: generated.time_minutes,
            difficulty: generated.difficulty,
            steps: generated.steps,
            materials: generated.materials,
            ncf_alignment: generated.ncf_alignment,
            success_count: 0,
            video_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Strategies,
    Solution,
}

static STRATEGY_VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
static SOLUTION_VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

fn build_validator<T: JsonSchema>() -> Result<Validator, String> {
    let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| e.to_string())?;
    jsonschema::validator_for(&schema).map_err(|e| e.to_string())
}

fn validator(kind: SchemaKind) -> Result<&'static Validator, String> {
    let slot = match kind {
        SchemaKind::Strategies => {
            STRATEGY_VALIDATOR.get_or_init(build_validator::<StrategyEnvelope>)
        }
        SchemaKind::Solution => SOLUTION_VALIDATOR.get_or_init(build_validator::<Solution>),
    };
    slot.as_ref().map_err(Clone::clone)
}

/// Checks `value` against the schema for `kind`, reporting every violation.
pub fn validate(kind: SchemaKind, value: &Value) -> Result<(), String> {
    let validator = validator(kind)?;
    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Repairs harmless deviations before validation: a bare strategy array,
/// capitalized difficulty values, and numeric strings for minutes.
pub fn normalize(kind: SchemaKind, mut value: Value) -> Value {
    if kind == SchemaKind::Strategies {
        if value.is_array() {
            value = serde_json::json!({ "strategies": value });
        }
        if let Some(items) = value
            .get_mut("strategies")
            .and_then(|v| v.as_array_mut())
        {
            for item in items.iter_mut().filter_map(|v| v.as_object_mut()) {
                if let Some(Value::String(difficulty)) = item.get_mut("difficulty") {
                    *difficulty = difficulty.trim().to_lowercase();
                }
                let minutes = match item.get("time_minutes") {
                    Some(Value::String(text)) => text
                        .trim()
                        .trim_end_matches("min")
                        .trim()
                        .parse::<u32>()
                        .ok(),
                    Some(Value::Number(number)) if !number.is_u64() => {
                        number.as_f64().filter(|m| *m >= 0.0).map(|m| m.round() as u32)
                    }
                    _ => None,
                };
                if let Some(minutes) = minutes {
                    item.insert("time_minutes".to_string(), Value::from(minutes));
                }
            }
        }
    }
    value
}
