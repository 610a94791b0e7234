use anyhow::Context;
use std::sync::Arc;
use syllabus_hub::embeddings::EmbeddingProvider;
use syllabus_hub::handlers::{create_router, AppState};
use syllabus_hub::llm::{ChatFallback, OpenAICompatChat};
use syllabus_hub::store::Database;
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting Syllabus Hub API");

    let config = syllabus_hub::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let db = Database::open(&config.storage.db_path)?;

    let embedding: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
        syllabus_hub::config::EmbeddingProvider::OpenAI => {
            let mut openai = syllabus_hub::embeddings::OpenAIEmbedding::new(
                config.embedding.api_key.clone(),
                Some(config.embedding.model.clone()),
                config.embedding.base_url.clone(),
            );

            if let Err(e) = openai.detect_dimension().await {
                tracing::warn!("Failed to detect dimension: {}. Model may not be available.", e);
                return Err(syllabus_hub::Error::Config(format!(
                    "Failed to initialize embeddings with model '{}'. Please ensure the API is accessible.",
                    config.embedding.model
                ))
                .into());
            }

            tracing::info!(
                "OpenAI-compatible embeddings initialized with model '{}' (dimension: {})",
                config.embedding.model,
                openai.dimension()
            );

            Arc::new(openai)
        }
        syllabus_hub::config::EmbeddingProvider::Ollama => {
            let mut ollama = syllabus_hub::embeddings::OllamaEmbedding::new(
                config.embedding.base_url.clone(),
                Some(config.embedding.model.clone()),
            );

            if let Err(e) = ollama.initialize().await {
                tracing::warn!("Failed to initialize Ollama: {}. Model may not be available.", e);
                return Err(syllabus_hub::Error::Config(format!(
                    "Failed to initialize Ollama with model '{}'. Please ensure Ollama is running and the model is pulled.",
                    config.embedding.model
                ))
                .into());
            }

            tracing::info!("Ollama initialized with model '{}'", config.embedding.model);

            Arc::new(ollama)
        }
    };
    tracing::info!("Embedding provider initialized: {}", embedding.provider_name());

    let primary = OpenAICompatChat::new("Primary", config.chat.primary.clone())?;
    let secondary = OpenAICompatChat::new("Groq", config.chat.secondary.clone())?;
    let chat = ChatFallback::new(Arc::new(primary), Arc::new(secondary));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, db.clone(), embedding, chat)?;
    let app = create_router(state)?;

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let flushed = db.flush().await?;
    info!("Server shut down, flushed {} bytes", flushed);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
