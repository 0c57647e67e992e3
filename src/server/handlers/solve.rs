use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::pipeline::SolveRequest;
use crate::state::AppState;

pub async fn snap_solve(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("No text provided".to_string()));
    }

    tracing::info!(
        chars = request.text.chars().count(),
        grade = %request.grade,
        subject = %request.subject,
        "Solve request received"
    );

    Ok(Json(state.pipeline.solve(&request).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::prompt::Language;
    use crate::state::testing::test_state;
    use crate::tools::media::testing::StaticMediaSearch;

    fn request(text: &str) -> SolveRequest {
        SolveRequest {
            text: text.to_string(),
            grade: "8".to_string(),
            subject: "Math".to_string(),
            language: Language::En,
        }
    }

    #[tokio::test]
    async fn empty_text_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), StaticMediaSearch::default());

        let result = snap_solve(State(state), Ok(Json(request("  ")))).await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "No text provided"));
    }

    #[tokio::test]
    async fn unconfigured_generation_returns_error_stub() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), StaticMediaSearch::default());

        let response = snap_solve(State(state), Ok(Json(request("2x + 3 = 7"))))
            .await
            .unwrap()
            .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["data"]["concept_explanation"], "Service unavailable");
        assert_eq!(value["data"]["detected_subject"], "Unknown");
    }
}
