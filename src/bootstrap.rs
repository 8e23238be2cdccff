//! Process startup: tracing, `.env`, router assembly and the serve loop.

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::openapi::InfoBuilder;

use crate::{app_state::AppState, config::Config, routes, swagger};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load `.env` into the process environment if the file exists.
pub fn init_env() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            warn!("Failed to load .env: {}", err);
        }
    }
}

/// Every route plus Swagger UI, with request tracing, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    let (router, mut openapi) = routes::routes_with_openapi().split_for_parts();
    openapi.info = InfoBuilder::new()
        .title("Campus Food Orders API")
        .version(env!("CARGO_PKG_VERSION"))
        .build();

    router
        .merge(swagger::create_swagger_ui(openapi))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on the configured address until Ctrl+C.
pub async fn serve(config: &Config, app: Router) -> Result<()> {
    let addr = config.server_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
