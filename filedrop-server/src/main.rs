mod auth;
mod config;
mod error;
mod handlers;
mod routes;
mod state;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use state::AppState;
use storage::DirectoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    info!("filedrop-server starting");

    let config_path = std::env::var_os("FILEDROP_CONFIG").map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;

    let store = DirectoryStore::new(&config.storage_root);
    store
        .init()
        .await
        .with_context(|| format!("Failed to prepare storage root {}", config.storage_root.display()))?;
    info!(root = %config.storage_root.display(), "Storage root ready");

    let identity = auth::identity::from_config(&config.identity)?;
    info!(mode = ?config.identity.mode, "Identity resolver configured");

    let state = Arc::new(AppState::new(
        Arc::new(store),
        identity,
        config.storage_root.clone(),
        config.max_upload_bytes,
    ));

    let app = routes::build_router(state, &config).layer(TraceLayer::new_for_http());

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
