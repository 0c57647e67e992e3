use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{admin, health, media, resources, solve, strategies};
use crate::state::AppState;

/// Creates the application router: health, strategy generation, problem
/// solving, media search, quick-reference resources and the indexing
/// endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/ncf-stats", get(health::ncf_stats))
        .route("/api/v1/sos", post(strategies::sos))
        .route("/api/v1/snap/solve", post(solve::snap_solve))
        .route("/api/v1/youtube-search", get(media::youtube_search))
        .route("/api/v1/search", get(media::unified_search))
        .route("/api/v1/resources", get(resources::resources))
        .route("/api/v1/admin/index-pdf", post(admin::index_pdf))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let origins = resolve_allowed_origins(configured)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }
    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:8081".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_origins_are_trimmed() {
        let origins = resolve_allowed_origins(&[
            " https://app.example ".to_string(),
            "".to_string(),
        ]);
        assert_eq!(origins, vec!["https://app.example"]);
    }

    #[test]
    fn empty_configuration_uses_local_defaults() {
        let origins = resolve_allowed_origins(&[]);
        assert!(origins.contains(&"http://localhost:5173".to_string()));
    }
}
