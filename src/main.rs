use std::sync::Arc;

use anyhow::Result;

use boxchat::api::{self, AppState};
use boxchat::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    boxchat::init_tracing();
    let settings = Settings::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {:#}", e);
        e
    })?;

    tracing::info!("Ollama endpoint: {} (model {})", settings.ollama.base_url, settings.ollama.model);
    tracing::info!(
        "Documents under {}, indexes under {}",
        settings.corpus.document_root.display(),
        settings.corpus.storage_root.display()
    );
    tracing::info!(
        "Retrieval mode {:?}, excerpt limit {} chars",
        settings.retrieval.mode,
        settings.retrieval.excerpt_chars
    );

    let state = Arc::new(AppState::from_settings(&settings)?);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.bind.as_str()).await?;
    tracing::info!("Question-answering server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
