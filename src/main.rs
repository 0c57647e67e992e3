use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use shiksha_backend::core;
use shiksha_backend::server;
use shiksha_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    let server_settings = &state.settings.server;
    let bind_addr = format!("{}:{}", server_settings.host, server_settings.port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("SHIKSHA_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);
    if !state.generator.is_configured() {
        tracing::warn!(
            "Generation is not configured; strategy requests will use the fallback catalog"
        );
    }

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
