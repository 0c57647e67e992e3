use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_optional_string_field(rag, "rag.collection_name", "collection_name")?;
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 1, 100_000)?;
        validate_u64_field(rag, "rag.chunk_overlap", "chunk_overlap", 0, 100_000)?;
        validate_u64_field(rag, "rag.min_page_chars", "min_page_chars", 0, 100_000)?;
        validate_u64_field(rag, "rag.top_k", "top_k", 1, 100)?;
        validate_u64_field(rag, "rag.max_context_tokens", "max_context_tokens", 1, 1_000_000)?;
        validate_f64_field(rag, "rag.relevance_threshold", "relevance_threshold", 0.0, 1.0)?;
        validate_enum_field(rag, "rag.chunk_unit", "chunk_unit", &["chars", "words"])?;
        validate_enum_field(rag, "rag.distance_metric", "distance_metric", &["cosine", "l2"])?;
        validate_enum_field(rag, "rag.store_backend", "store_backend", &["sqlite", "memory"])?;

        let chunk_size = rag.get("chunk_size").and_then(|v| v.as_u64()).unwrap_or(500);
        let overlap = rag.get("chunk_overlap").and_then(|v| v.as_u64()).unwrap_or(100);
        if overlap >= chunk_size {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at 'rag.chunk_overlap': must be smaller than chunk_size ({})",
                chunk_size
            )));
        }
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
        validate_u64_field(embedding, "embedding.batch_size", "batch_size", 1, 2048)?;
    }

    if let Some(generation) = expect_optional_object(root, "generation")? {
        validate_enum_field(
            generation,
            "generation.provider",
            "provider",
            &["gemini", "openai_compatible"],
        )?;
        validate_optional_string_field(generation, "generation.model", "model")?;
        validate_optional_string_field(generation, "generation.base_url", "base_url")?;
        validate_optional_string_field(generation, "generation.api_key", "api_key")?;
        validate_f64_field(generation, "generation.temperature", "temperature", 0.0, 2.0)?;
        validate_f64_field(
            generation,
            "generation.solve_temperature",
            "solve_temperature",
            0.0,
            2.0,
        )?;
        validate_u64_field(
            generation,
            "generation.max_output_tokens",
            "max_output_tokens",
            1,
            65_536,
        )?;
        validate_u64_field(generation, "generation.max_retries", "max_retries", 0, 10)?;
        validate_u64_field(
            generation,
            "generation.initial_backoff_ms",
            "initial_backoff_ms",
            0,
            600_000,
        )?;
        validate_u64_field(
            generation,
            "generation.emergency_threshold_minutes",
            "emergency_threshold_minutes",
            0,
            60,
        )?;
    }

    if let Some(media) = expect_optional_object(root, "media")? {
        validate_bool_field(media, "media.enabled", "enabled")?;
        validate_bool_field(media, "media.llm_query_rewrite", "llm_query_rewrite")?;
        validate_u64_field(media, "media.video_limit", "video_limit", 1, 50)?;
        validate_u64_field(media, "media.document_limit", "document_limit", 1, 50)?;
        validate_u64_field(media, "media.oembed_per_second", "oembed_per_second", 1, 100)?;
        validate_optional_string_field(
            media,
            "media.google_search_api_key",
            "google_search_api_key",
        )?;
        validate_optional_string_field(
            media,
            "media.google_search_engine_id",
            "google_search_engine_id",
        )?;
    }

    if let Some(timeouts) = expect_optional_object(root, "timeouts")? {
        for key in ["embedding", "vector_query", "generation", "media"] {
            validate_u64_field(timeouts, &format!("timeouts.{}", key), key, 1, 3_600)?;
        }
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_config() {
        assert!(validate_config(&json!({})).is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = validate_config(&json!({
            "rag": { "chunk_size": 100, "chunk_overlap": 100 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("rag.chunk_overlap"));
    }

    #[test]
    fn rejects_unknown_provider_and_bad_threshold() {
        assert!(validate_config(&json!({ "generation": { "provider": "palm" } })).is_err());
        assert!(validate_config(&json!({ "rag": { "relevance_threshold": 1.5 } })).is_err());
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(validate_config(&json!({ "media": { "enabled": "yes" } })).is_err());
        assert!(validate_config(&json!({ "timeouts": { "generation": 0 } })).is_err());
        assert!(validate_config(&json!({ "server": [] })).is_err());
    }
}
