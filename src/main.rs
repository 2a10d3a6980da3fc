use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use versa::{server, Config, GenerationService, OpenAiBackend, SqliteHistoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "versa=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!(
        "Starting Versa on {}:{} (model {})",
        config.server.host,
        config.server.port,
        config.llm.model
    );

    let backend = OpenAiBackend::from_config(&config.llm)?;
    if !backend.has_api_key() {
        tracing::warn!("DEEPSEEK_API_KEY is not set; upstream calls will be unauthenticated");
    }
    tracing::info!("Completion endpoint: {}", backend.endpoint());

    let store = SqliteHistoryStore::connect(&config.database.url)
        .await
        .with_context(|| format!("opening history database {}", config.database.url))?;
    tracing::info!("History database ready");

    let service = GenerationService::new(Arc::new(backend), Arc::new(store), config.llm.model);
    let app = server::router(service);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Versa listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Versa stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down HTTP server..."),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
