use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

const HEALTH_STATS_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (rag_indexed, documents_count) =
        match tokio::time::timeout(HEALTH_STATS_TIMEOUT, state.pipeline.stats()).await {
            Ok(Ok(stats)) => (stats.is_ready, stats.document_count),
            Ok(Err(err)) => {
                tracing::warn!("Index check failed: {}", err);
                (false, 0)
            }
            Err(_) => {
                tracing::warn!("Index check timed out");
                (false, 0)
            }
        };

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "rag_indexed": rag_indexed,
        "documents_count": documents_count,
        "generation_configured": state.pipeline.generation_configured(),
    }))
}

pub async fn ncf_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.pipeline.stats().await?;
    Ok(Json(json!({
        "success": true,
        "chunks_indexed": stats.document_count,
        "is_ready": stats.is_ready,
        "collection_name": stats.collection_name,
        "embedding_model": stats.embedding_model,
        "indexed_at": stats.indexed_at,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use crate::tools::media::testing::StaticMediaSearch;

    #[tokio::test]
    async fn health_reports_cold_index_and_missing_credential() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path(), StaticMediaSearch::default());

        let response = health(State(state)).await.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["status"], "healthy");
        assert_eq!(value["rag_indexed"], false);
        assert_eq!(value["documents_count"], 0);
        assert_eq!(value["generation_configured"], false);
    }
}
