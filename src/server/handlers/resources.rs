use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::pipeline::resources::quick_reference;

/// Static quick-reference tips; needs no index or model.
pub async fn resources() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "resources": quick_reference(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_all_four_topics() {
        let response = resources().await.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["success"], true);
        let topics = value["resources"].as_object().unwrap();
        assert_eq!(topics.len(), 4);
        assert_eq!(
            value["resources"]["classroom_management"]["title_hi"],
            "कक्षा प्रबंधन त्वरित सुझाव"
        );
        assert_eq!(
            value["resources"]["differentiation"]["strategies"].as_array().unwrap().len(),
            4
        );
    }
}
