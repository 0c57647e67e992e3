use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

const MAX_VIDEO_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

impl SearchParams {
    fn query(&self) -> Result<&str, ApiError> {
        let query = self.q.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest(
                "Query parameter \"q\" is required".to_string(),
            ));
        }
        Ok(query)
    }
}

pub async fn youtube_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.query()?;
    let limit = params
        .limit
        .unwrap_or(state.settings.media.video_limit)
        .clamp(1, MAX_VIDEO_LIMIT);

    let videos = state.pipeline.search_videos(query, limit).await;
    Ok(Json(json!({
        "success": true,
        "query": query,
        "count": videos.len(),
        "videos": videos,
    })))
}

pub async fn unified_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.query()?;
    let results = state.pipeline.unified_search(query).await;
    Ok(Json(json!({
        "success": true,
        "query": query,
        "results": results,
    })))
}
