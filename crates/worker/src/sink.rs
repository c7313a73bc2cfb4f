//! The insight sink.
//!
//! Stores each accepted envelope, counts its data points toward the next
//! insight for its database, then hands it to the sync worker.

use async_trait::async_trait;
use sink_core::schema::validate_envelope;
use sink_core::{
    InsightModel, MeasurementEnvelope, MeasurementSink, MeasurementStore, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info, warn};

use crate::accumulator::BatchAccumulator;
use crate::config::InsightConfig;
use crate::drain::DrainGroup;
use crate::handoff::{IngestionHandoff, SyncBookkeeper, SyncWatermark};
use crate::synthesizer::InsightSynthesizer;

/// Returned to the caller for every accepted envelope.
pub const SUCCESS_MESSAGE: &str = "Successfully inserted batch!";

pub struct InsightSink {
    store: Arc<dyn MeasurementStore>,
    accumulator: BatchAccumulator,
    handoff: IngestionHandoff,
    bookkeeper: Arc<SyncBookkeeper>,
    synthesizer: Arc<InsightSynthesizer>,
    drain: DrainGroup,
    config: InsightConfig,
}

impl InsightSink {
    /// Validates the config, creates the schema, and starts the handoff worker.
    pub async fn new(
        store: Arc<dyn MeasurementStore>,
        model: Arc<dyn InsightModel>,
        config: InsightConfig,
    ) -> Result<Self> {
        config.validate()?;
        store.initialize_schema().await?;

        let accumulator = BatchAccumulator::new(config.batch_size)?;
        let bookkeeper = Arc::new(SyncBookkeeper::new());
        let handoff = IngestionHandoff::start(config.handoff_capacity, bookkeeper.clone())?;
        let synthesizer = Arc::new(InsightSynthesizer::new(
            store.clone(),
            model.clone(),
            config.clone(),
        ));

        info!(
            model = model.name(),
            batch_size = config.batch_size,
            window = config.window,
            handoff_capacity = config.handoff_capacity,
            "Insight sink ready"
        );

        Ok(Self {
            store,
            accumulator,
            handoff,
            bookkeeper,
            synthesizer,
            drain: DrainGroup::new(),
            config,
        })
    }

    /// Outstanding insight tasks for this sink.
    pub fn drain(&self) -> &DrainGroup {
        &self.drain
    }

    pub fn sync_watermarks(&self) -> HashMap<(String, String), SyncWatermark> {
        self.bookkeeper.snapshot()
    }

    /// Data points counted toward the database's next insight.
    pub fn pending(&self, db_name: &str) -> u64 {
        self.accumulator.pending(db_name)
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }
}

#[async_trait]
impl MeasurementSink for InsightSink {
    async fn update_measurements(&self, envelope: MeasurementEnvelope) -> Result<String> {
        let started = Instant::now();
        metrics().envelopes_received.inc();

        if let Err(e) = validate_envelope(&envelope) {
            metrics().envelopes_rejected.inc();
            warn!(db_name = %envelope.db_name, error = %e, "Envelope rejected");
            return Err(e);
        }

        let envelope = Arc::new(envelope);

        let inserted = match self.store.insert_measurements(&envelope).await {
            Ok(n) => n,
            Err(e) => {
                error!(
                    db_name = %envelope.db_name,
                    metric = %envelope.metric_name,
                    error = %e,
                    "Failed to store envelope"
                );
                return Err(e);
            }
        };

        // Rows are durable from here on; nothing below fails the call.
        if let Some(permit) = self.accumulator.record(&envelope.db_name, inserted as u64) {
            metrics().insights_triggered.inc();
            debug!(db_name = %envelope.db_name, "Insight triggered");
            let token = self.drain.add();
            self.synthesizer.spawn(permit, token);
        }

        if let Err(e) = self.handoff.push(envelope.clone()).await {
            error!(
                db_name = %envelope.db_name,
                metric = %envelope.metric_name,
                error = %e,
                "Failed to hand off stored envelope"
            );
        }

        metrics()
            .ingest_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        Ok(SUCCESS_MESSAGE.to_string())
    }
}
