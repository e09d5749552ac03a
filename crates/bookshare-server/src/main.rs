mod config;
mod sweeper;

use std::sync::Arc;

use tracing::info;

use bookshare_api::router::router;
use bookshare_api::state::{AppState, AppStateInner};

use crate::config::ServerConfig;
use crate::sweeper::ExpirySweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookshare=debug,bookshare_api=debug,bookshare_db=info,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = bookshare_db::Database::open(&config.db_path)?;

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
    });

    // Background expiry of stale listings
    let sweeper = ExpirySweeper::start(
        app_state.clone(),
        config.listing_retention,
        config.sweep_interval,
    );

    let app = router(app_state);

    info!("Bookshare server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    info!("Bookshare server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
