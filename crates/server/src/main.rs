//! Beer recommendation web server.
//!
//! Loads the beer catalog and the k-NN model once, then serves the HTML
//! front end and the JSON endpoints until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server::{AppState, ServerConfig, load_recommender, router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    info!("Starting beer recommender with {:?}", config);

    let ranker = config.ranker_config();
    let beers_path = config.beers_path.clone();
    let model_path = config.model_path.clone();
    let recommender =
        tokio::task::spawn_blocking(move || load_recommender(&beers_path, &model_path, ranker))
            .await
            .context("Artifact loading task panicked")??;

    let app = router(AppState::new(recommender));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
