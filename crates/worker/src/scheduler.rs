//! Worker scheduler for periodic background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use llm_client::OllamaClient;
use postgres_store::PostgresStore;
use telemetry::{health, metrics};

use crate::drain::DrainGroup;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Metrics snapshot log interval
    pub metrics_log_interval: Duration,
    /// Postgres and model health check interval
    pub health_check_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            metrics_log_interval: Duration::from_secs(60),  // 1 minute
            health_check_interval: Duration::from_secs(30), // 30 seconds
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    store: Arc<PostgresStore>,
    model: Arc<OllamaClient>,
    drain: DrainGroup,
}

impl WorkerScheduler {
    pub fn new(
        config: WorkerConfig,
        store: Arc<PostgresStore>,
        model: Arc<OllamaClient>,
        drain: DrainGroup,
    ) -> Self {
        Self {
            config,
            store,
            model,
            drain,
        }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_log().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_health_checks().await;
        }));

        info!("Background workers started");
        handles
    }

    async fn run_metrics_log(&self) {
        let mut ticker = interval(self.config.metrics_log_interval);

        loop {
            ticker.tick().await;

            let snapshot = metrics().snapshot();
            info!(
                envelopes_received = snapshot.envelopes_received,
                envelopes_rejected = snapshot.envelopes_rejected,
                measurements_inserted = snapshot.measurements_inserted,
                storage_errors = snapshot.storage_errors,
                insights_triggered = snapshot.insights_triggered,
                insights_generated = snapshot.insights_generated,
                generation_errors = snapshot.generation_errors,
                handoff_queue_depth = snapshot.handoff_queue_depth,
                blocked_producers = snapshot.blocked_producers,
                outstanding_insights = self.drain.outstanding(),
                ingest_latency_mean_ms = snapshot.ingest_latency_mean_ms,
                model_latency_mean_ms = snapshot.model_latency_mean_ms,
                "Pipeline metrics"
            );
        }
    }

    async fn run_health_checks(&self) {
        let mut ticker = interval(self.config.health_check_interval);

        loop {
            ticker.tick().await;
            check_dependencies(&self.store, &self.model).await;
        }
    }
}

/// Probes Postgres and the model and records the result in the health registry.
pub async fn check_dependencies(store: &PostgresStore, model: &OllamaClient) {
    if postgres_store::health::check_connection(store).await {
        health().postgres.set_healthy();
    } else {
        warn!("PostgreSQL unreachable");
        health().postgres.set_unhealthy("PostgreSQL connection failed");
    }

    if model.check_connection().await {
        health().model.set_healthy();
    } else {
        warn!(url = %model.config().url, "Model server unreachable");
        health().model.set_unhealthy("Ollama connection failed");
    }
}
