//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty `config.yml` yields a working
//! development setup (local embedding server, no generation credential).

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::rag::{ChunkUnit, DistanceMetric};

/// Placeholder shipped in sample env files; treated as "no credential".
const API_KEY_PLACEHOLDER: &str = "your-gemini-api-key-here";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Gemini,
    OpenAiCompatible,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub collection_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_unit: ChunkUnit,
    pub min_page_chars: usize,
    pub top_k: usize,
    pub max_context_tokens: usize,
    pub relevance_threshold: f64,
    pub distance_metric: DistanceMetric,
    pub store_backend: StoreBackend,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub solve_temperature: f64,
    pub max_output_tokens: u32,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub emergency_threshold_minutes: u32,
}

impl GenerationSettings {
    /// The usable credential, if any. Empty strings and the sample
    /// placeholder count as missing.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != API_KEY_PLACEHOLDER)
    }

    pub fn is_configured(&self) -> bool {
        match self.provider {
            ProviderKind::Gemini => self.credential().is_some(),
            ProviderKind::OpenAiCompatible => self.base_url.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub enabled: bool,
    pub video_limit: usize,
    pub document_limit: usize,
    pub llm_query_rewrite: bool,
    pub oembed_per_second: u32,
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Timeouts {
    pub embedding: Duration,
    pub vector_query: Duration,
    pub generation: Duration,
    pub media: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub rag: RagSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub media: MediaSettings,
    pub timeouts: Timeouts,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Value::Object(Default::default()))
    }
}

impl Settings {
    pub fn from_config(config: &Value) -> Self {
        let rag = RagSettings {
            collection_name: string_at(config, "rag", "collection_name")
                .unwrap_or_else(|| "ncf_documents".to_string()),
            chunk_size: u64_at(config, "rag", "chunk_size").unwrap_or(500) as usize,
            chunk_overlap: u64_at(config, "rag", "chunk_overlap").unwrap_or(100) as usize,
            chunk_unit: match str_at(config, "rag", "chunk_unit") {
                Some("words") => ChunkUnit::Words,
                _ => ChunkUnit::Chars,
            },
            min_page_chars: u64_at(config, "rag", "min_page_chars").unwrap_or(0) as usize,
            top_k: u64_at(config, "rag", "top_k").unwrap_or(5) as usize,
            max_context_tokens: u64_at(config, "rag", "max_context_tokens").unwrap_or(2000)
                as usize,
            relevance_threshold: f64_at(config, "rag", "relevance_threshold").unwrap_or(0.3),
            distance_metric: match str_at(config, "rag", "distance_metric") {
                Some("l2") => DistanceMetric::L2,
                _ => DistanceMetric::Cosine,
            },
            store_backend: match str_at(config, "rag", "store_backend") {
                Some("memory") => StoreBackend::Memory,
                _ => StoreBackend::Sqlite,
            },
        };

        let embedding = EmbeddingSettings {
            base_url: string_at(config, "embedding", "base_url")
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            model: string_at(config, "embedding", "model")
                .unwrap_or_else(|| "all-minilm".to_string()),
            api_key: string_at(config, "embedding", "api_key").filter(|k| !k.trim().is_empty()),
            batch_size: u64_at(config, "embedding", "batch_size").unwrap_or(32) as usize,
        };

        let provider = match str_at(config, "generation", "provider") {
            Some("openai_compatible") => ProviderKind::OpenAiCompatible,
            _ => ProviderKind::Gemini,
        };
        let generation = GenerationSettings {
            provider,
            model: string_at(config, "generation", "model")
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            base_url: string_at(config, "generation", "base_url"),
            api_key: string_at(config, "generation", "api_key"),
            temperature: f64_at(config, "generation", "temperature").unwrap_or(0.7),
            solve_temperature: f64_at(config, "generation", "solve_temperature").unwrap_or(0.4),
            max_output_tokens: u64_at(config, "generation", "max_output_tokens").unwrap_or(1500)
                as u32,
            max_retries: u64_at(config, "generation", "max_retries").unwrap_or(3) as u32,
            initial_backoff: Duration::from_millis(
                u64_at(config, "generation", "initial_backoff_ms").unwrap_or(2000),
            ),
            emergency_threshold_minutes: u64_at(
                config,
                "generation",
                "emergency_threshold_minutes",
            )
            .unwrap_or(5) as u32,
        };

        let media = MediaSettings {
            enabled: bool_at(config, "media", "enabled").unwrap_or(true),
            video_limit: u64_at(config, "media", "video_limit").unwrap_or(5) as usize,
            document_limit: u64_at(config, "media", "document_limit").unwrap_or(5) as usize,
            llm_query_rewrite: bool_at(config, "media", "llm_query_rewrite").unwrap_or(true),
            oembed_per_second: u64_at(config, "media", "oembed_per_second").unwrap_or(5) as u32,
            google_search_api_key: string_at(config, "media", "google_search_api_key")
                .filter(|k| !k.trim().is_empty()),
            google_search_engine_id: string_at(config, "media", "google_search_engine_id")
                .filter(|k| !k.trim().is_empty()),
        };

        let timeouts = Timeouts {
            embedding: secs_at(config, "embedding", 30),
            vector_query: secs_at(config, "vector_query", 10),
            generation: secs_at(config, "generation", 60),
            media: secs_at(config, "media", 15),
        };

        let port = std::env::var("PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
            .or_else(|| u64_at(config, "server", "port").map(|p| p as u16))
            .unwrap_or(8000);
        let server = ServerSettings {
            host: string_at(config, "server", "host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            cors_allowed_origins: config
                .get("server")
                .and_then(|v| v.get("cors_allowed_origins"))
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        };

        Settings {
            rag,
            embedding,
            generation,
            media,
            timeouts,
            server,
        }
    }
}

fn str_at<'a>(config: &'a Value, section: &str, key: &str) -> Option<&'a str> {
    config
        .get(section)
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
}

fn string_at(config: &Value, section: &str, key: &str) -> Option<String> {
    str_at(config, section, key).map(str::to_string)
}

fn u64_at(config: &Value, section: &str, key: &str) -> Option<u64> {
    config
        .get(section)
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_u64())
}

fn f64_at(config: &Value, section: &str, key: &str) -> Option<f64> {
    config
        .get(section)
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_f64())
}

fn bool_at(config: &Value, section: &str, key: &str) -> Option<bool> {
    config
        .get(section)
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_bool())
}

fn secs_at(config: &Value, key: &str, default: u64) -> Duration {
    Duration::from_secs(u64_at(config, "timeouts", key).unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.rag.collection_name, "ncf_documents");
        assert_eq!(settings.rag.chunk_size, 500);
        assert_eq!(settings.rag.chunk_overlap, 100);
        assert_eq!(settings.rag.relevance_threshold, 0.3);
        assert_eq!(settings.rag.distance_metric, DistanceMetric::Cosine);
        assert_eq!(settings.generation.max_retries, 3);
        assert_eq!(settings.generation.initial_backoff, Duration::from_secs(2));
        assert!(!settings.generation.is_configured());
    }

    #[test]
    fn placeholder_key_is_not_a_credential() {
        let settings = Settings::from_config(&json!({
            "generation": { "api_key": "your-gemini-api-key-here" }
        }));
        assert!(settings.generation.credential().is_none());

        let settings = Settings::from_config(&json!({
            "generation": { "api_key": " real-key " }
        }));
        assert_eq!(settings.generation.credential(), Some("real-key"));
        assert!(settings.generation.is_configured());
    }

    #[test]
    fn reads_enums_and_timeouts() {
        let settings = Settings::from_config(&json!({
            "rag": { "chunk_unit": "words", "distance_metric": "l2", "store_backend": "memory" },
            "generation": { "provider": "openai_compatible", "base_url": "http://localhost:1234" },
            "timeouts": { "generation": 5 }
        }));
        assert_eq!(settings.rag.chunk_unit, ChunkUnit::Words);
        assert_eq!(settings.rag.distance_metric, DistanceMetric::L2);
        assert_eq!(settings.rag.store_backend, StoreBackend::Memory);
        assert_eq!(settings.generation.provider, ProviderKind::OpenAiCompatible);
        assert!(settings.generation.is_configured());
        assert_eq!(settings.timeouts.generation, Duration::from_secs(5));
    }
}
