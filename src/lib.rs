pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::server::start_api_server;
use crate::api::types::AppContext;
use crate::config::{ConfigError, ServiceConfig};
use crate::db::history::SqliteHistoryStore;
use crate::db::DatabaseError;
use crate::pipeline::chunked::PoolConfig;
use crate::pipeline::structuring::{OllamaClient, StructuringError};
use crate::pipeline::{LabReportProcessor, PipelineConfig};

/// Errors that stop the service before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Model backend error: {0}")]
    Structuring(#[from] StructuringError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Run the service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServiceConfig::from_env()?;
    let store = Arc::new(SqliteHistoryStore::open(&config.db_path)?);
    tracing::info!(path = %config.db_path.display(), "History database ready");

    // The blocking reqwest client owns its own runtime; keep it off the async workers.
    let backend = config.clone();
    let (client, model) = tokio::task::spawn_blocking(move || {
        let client = OllamaClient::new(&backend.ollama_url, backend.llm_timeout)?;
        let model = match backend.model {
            Some(model) => model,
            None => client.find_best_model()?,
        };
        Ok::<_, StructuringError>((client, model))
    })
    .await??;
    tracing::info!(url = %client.base_url(), model = %model, "Model backend selected");

    let pipeline_config = PipelineConfig {
        pool: PoolConfig {
            deadline: config.deadline,
            ..PoolConfig::default()
        },
        ..PipelineConfig::default()
    };
    let processor = LabReportProcessor::new(Arc::new(client), &model, pipeline_config)
        .with_history(store.clone())
        .with_profiles(store);

    let server = start_api_server(AppContext::new(processor), config.bind).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.shutdown().await;
    Ok(())
}
