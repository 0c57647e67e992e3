use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::IndexStatus;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IndexPdfRequest {
    #[serde(default)]
    pub pdf_path: Option<PathBuf>,
    #[serde(default)]
    pub force: bool,
}

pub async fn index_pdf(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IndexPdfRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        // An empty body indexes the default document.
        Err(JsonRejection::MissingJsonContentType(_)) => IndexPdfRequest::default(),
        Err(rejection) => return Err(ApiError::BadRequest(rejection.body_text())),
    };

    let report = state
        .pipeline
        .index(request.pdf_path.as_deref(), request.force)
        .await?;

    let message = match report.status {
        IndexStatus::Success => "PDF indexed successfully",
        IndexStatus::Skipped => "PDF already indexed",
        IndexStatus::Error => "PDF produced no indexable text",
    };
    Ok(Json(json!({
        "success": report.status != IndexStatus::Error,
        "message": message,
        "chunks_created": report.chunks_count,
        "status": report.status,
        "report": report,
    })))
}
