//! Insight Sink
//!
//! Receives measurement envelopes from a database-monitoring agent and:
//! - Stores every data point in PostgreSQL (one transaction per envelope)
//! - Tracks per-(database, metric) sync watermarks off the request path
//! - Asks a local Ollama model for an insight every `batch_size` data points

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use llm_client::{OllamaClient, OllamaConfig};
use postgres_store::{PostgresConfig, PostgresStore};
use telemetry::init_tracing_from_env;
use worker::{check_dependencies, InsightConfig, InsightSink, WorkerConfig, WorkerScheduler};

/// How long shutdown waits for running insight tasks.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    postgres: PostgresConfig,

    #[serde(default)]
    ollama: OllamaConfig,

    #[serde(default)]
    insights: InsightConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            postgres: PostgresConfig::default(),
            ollama: OllamaConfig::default(),
            insights: InsightConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Insight Sink v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        pool_size = config.postgres.pool_size,
        measurements_table = %config.postgres.tables.measurements,
        ollama_url = %config.ollama.url,
        model = %config.ollama.model,
        batch_size = config.insights.batch_size,
        "Loaded config"
    );

    // Table names are validated here, before any SQL runs
    let store = Arc::new(
        PostgresStore::new(config.postgres.clone()).context("Failed to create PostgreSQL store")?,
    );

    let model = Arc::new(
        OllamaClient::new(config.ollama.clone()).context("Failed to create Ollama client")?,
    );

    // Startup health checks. A missing model only degrades the service.
    check_dependencies(&store, &model).await;

    let sink = Arc::new(
        InsightSink::new(store.clone(), model.clone(), config.insights.clone())
            .await
            .context("Failed to initialize insight sink")?,
    );

    let drain = sink.drain().clone();

    let scheduler = Arc::new(WorkerScheduler::new(
        WorkerConfig::default(),
        store.clone(),
        model.clone(),
        drain.clone(),
    ));
    let worker_handles = scheduler.start();

    let app = router(AppState::from_insight_sink(sink));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    for handle in worker_handles {
        handle.abort();
    }

    let outstanding = drain.outstanding();
    if outstanding > 0 {
        info!(outstanding = outstanding, "Waiting for insight tasks");
    }
    if !drain.wait_timeout(DRAIN_TIMEOUT).await {
        warn!(
            outstanding = drain.outstanding(),
            "Insight tasks still running at shutdown"
        );
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("INSIGHT_SINK")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("INSIGHT_SINK_POSTGRES_URL") {
        config.postgres.url = url;
    }
    if let Ok(url) = std::env::var("INSIGHT_SINK_OLLAMA_URL") {
        config.ollama.url = url;
    }
    if let Ok(model) = std::env::var("INSIGHT_SINK_OLLAMA_MODEL") {
        config.ollama.model = model;
    }
    if let Ok(batch_size) = std::env::var("INSIGHT_SINK_BATCH_SIZE") {
        match batch_size.parse() {
            Ok(n) => config.insights.batch_size = n,
            Err(_) => error!(value = %batch_size, "Ignoring invalid INSIGHT_SINK_BATCH_SIZE"),
        }
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
