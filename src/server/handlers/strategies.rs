use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::pipeline::prompt::Language;
use crate::pipeline::{GenerationResult, StrategyRequest};
use crate::state::AppState;

const CHALLENGE_PREVIEW_CHARS: usize = 100;

fn default_time_left() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct TeacherContext {
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub class_size: Option<u32>,
    #[serde(default = "default_time_left")]
    pub time_left_minutes: u32,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SosRequest {
    pub query: String,
    pub context: TeacherContext,
}

impl From<SosRequest> for StrategyRequest {
    fn from(request: SosRequest) -> Self {
        let context = request.context;
        StrategyRequest {
            query: request.query,
            grade: context.grade,
            subject: context.subject,
            class_size: context.class_size,
            time_left_minutes: context.time_left_minutes,
            language: context.language,
            teacher_name: context.teacher_name,
            extra_context: context.notes,
        }
    }
}

#[derive(Debug, Serialize)]
struct ContextUnderstood {
    grade: String,
    subject: String,
    challenge: String,
}

#[derive(Debug, Serialize)]
struct SosResponse {
    success: bool,
    context_understood: ContextUnderstood,
    rag_sources: Vec<String>,
    #[serde(flatten)]
    result: GenerationResult,
}

/// Classroom emergency help. Valid requests always get strategies.
pub async fn sos(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SosRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = StrategyRequest::from(payload);
    request.validate().map_err(ApiError::BadRequest)?;

    tracing::info!(
        grade = %request.grade,
        subject = %request.subject,
        time_left = request.time_left_minutes,
        "SOS request received"
    );

    let result = state.pipeline.generate(&request).await;
    Ok(Json(SosResponse {
        success: true,
        context_understood: ContextUnderstood {
            grade: request.grade.clone(),
            subject: request.subject.clone(),
            challenge: request.query.chars().take(CHALLENGE_PREVIEW_CHARS).collect(),
        },
        rag_sources: result.sources_used.clone(),
        result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use crate::tools::media::testing::StaticMediaSearch;
    use serde_json::{json, Value};

    async fn call(state: Arc<AppState>, body: Value) -> Result<Value, ApiError> {
        let request: SosRequest = serde_json::from_value(body).unwrap();
        let response = sos(State(state), Ok(Json(request))).await?.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Ok(serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn offline_request_returns_fallback_strategies() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), StaticMediaSearch::default());

        let value = call(
            state,
            json!({
                "query": "bachche fractions nahi samajh rahe",
                "context": {
                    "grade": "4",
                    "subject": "Math",
                    "time_left_minutes": 15,
                    "language": "hinglish"
                }
            }),
        )
        .await
        .unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["strategies"].as_array().unwrap().len(), 3);
        assert_eq!(value["strategies"][0]["title_hi"], "रोटी विभाजन विधि");
        assert_eq!(value["ncf_used"], false);
        assert_eq!(value["confidence_score"], 0.0);
        assert_eq!(value["offline_available"], true);
        assert_eq!(value["context_understood"]["subject"], "Math");
    }

    #[tokio::test]
    async fn out_of_range_time_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), StaticMediaSearch::default());

        let err = call(
            state,
            json!({ "query": "noise", "context": { "time_left_minutes": 90 } }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn overlong_query_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), StaticMediaSearch::default());

        let err = call(state, json!({ "query": "x".repeat(501), "context": {} }))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
