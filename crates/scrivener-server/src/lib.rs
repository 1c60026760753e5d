//! Scrivener Server
//!
//! HTTP front end for the research service: submit topics, follow sessions,
//! fetch final reports, cancel and resume.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::ServerConfig;
use handlers::{create_router, AppState};
use scrivener_llm::OllamaProvider;
use scrivener_pipeline::{ResearchService, SharedStore};
use scrivener_store::SqliteSessionStore;
use scrivener_web::{HttpFetcher, TavilySearch};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Session store could not be opened
    #[error("Failed to open session store: {0}")]
    Store(#[from] scrivener_store::StoreError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Start the HTTP server
///
/// Opens the session store, builds the collaborators, optionally resumes
/// sessions a previous process left running, and serves until stopped.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Scrivener server");
    info!("Bind address: {}", config.bind_addr());
    info!("Database: {}", config.database_path.display());
    info!("Model: {} at {}", config.model, config.ollama_endpoint);

    let api_key = config.require_tavily_key()?.to_string();
    let retry = &config.pipeline.research.retry;
    let llm = OllamaProvider::new(config.ollama_endpoint.clone(), config.model.clone())
        .with_timeout(Duration::from_secs(retry.call_timeout_secs))
        .with_max_retries(1);
    let search = TavilySearch::new(api_key);
    let fetcher = HttpFetcher::new(config.fetcher.clone());
    let store = SqliteSessionStore::new(&config.database_path)?;

    let service = ResearchService::new(
        Arc::new(llm),
        Arc::new(search),
        Arc::new(fetcher),
        SharedStore::new(store),
        config.pipeline.clone(),
    );

    if config.pipeline.resume_interrupted {
        match service.recover_interrupted() {
            Ok(resumed) if !resumed.is_empty() => {
                info!("Resumed {} interrupted sessions", resumed.len())
            }
            Ok(_) => {}
            Err(e) => warn!("Could not scan for interrupted sessions: {}", e),
        }
    }

    let app = create_router(AppState {
        service: Arc::new(service),
    });

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}
