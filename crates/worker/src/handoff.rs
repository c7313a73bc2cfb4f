//! Bounded ingestion handoff.
//!
//! Accepted envelopes are queued for a single background worker that does
//! the per-sink sync bookkeeping. The queue has a fixed capacity; pushing
//! into a full queue suspends the caller until the worker frees a slot.
//! Suspended callers are counted in the `blocked_producers` gauge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sink_core::{Error, MeasurementEnvelope, Result};
use std::collections::HashMap;
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Work done by the handoff worker for each envelope.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn handle(&self, envelope: Arc<MeasurementEnvelope>);
}

/// Queue plus its one worker task.
///
/// The worker exits once the handoff is dropped and the queue is drained.
pub struct IngestionHandoff {
    sender: mpsc::Sender<Arc<MeasurementEnvelope>>,
    worker: JoinHandle<()>,
}

impl IngestionHandoff {
    /// Creates the queue and spawns its worker.
    pub fn start(capacity: usize, handler: Arc<dyn SyncHandler>) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::configuration("handoff capacity must be positive"));
        }

        let (sender, mut receiver) = mpsc::channel::<Arc<MeasurementEnvelope>>(capacity);

        let worker = tokio::spawn(async move {
            debug!(capacity = capacity, "Ingestion handoff worker started");
            while let Some(envelope) = receiver.recv().await {
                metrics().handoff_queue_depth.dec();
                handler.handle(envelope).await;
                metrics().handoff_processed.inc();
            }
            info!("Ingestion handoff worker stopped");
        });

        Ok(Self { sender, worker })
    }

    /// Queues an envelope, waiting while the queue is full.
    ///
    /// Cancel-safe: dropping the future before the send completes leaves the
    /// gauges as they were.
    pub async fn push(&self, envelope: Arc<MeasurementEnvelope>) -> Result<()> {
        let _blocked = if self.sender.capacity() == 0 {
            warn!(
                db_name = %envelope.db_name,
                capacity = self.sender.max_capacity(),
                "Ingestion handoff full, waiting"
            );
            Some(metrics().blocked_producers.track())
        } else {
            None
        };

        // Counted before sending so the worker's decrement never runs first.
        let queued = metrics().handoff_queue_depth.track();
        match self.sender.send(envelope).await {
            Ok(()) => {
                queued.keep();
                Ok(())
            }
            Err(_) => Err(Error::internal("ingestion handoff worker stopped")),
        }
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Envelopes queued but not yet picked up by the worker.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stops accepting envelopes and waits for the worker to finish the queue.
    pub async fn close(self) {
        let Self { sender, worker } = self;
        drop(sender);
        if let Err(e) = worker.await {
            warn!("Ingestion handoff worker ended abnormally: {}", e);
        }
    }
}

/// Sync state for one (database, metric) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncWatermark {
    pub envelopes: u64,
    pub data_points: u64,
    pub last_seen: DateTime<Utc>,
}

/// Default handler: tracks per-(database, metric) watermarks.
#[derive(Debug, Default)]
pub struct SyncBookkeeper {
    watermarks: RwLock<HashMap<(String, String), SyncWatermark>>,
}

impl SyncBookkeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, db_name: &str, metric_name: &str) -> Option<SyncWatermark> {
        self.watermarks
            .read()
            .get(&(db_name.to_string(), metric_name.to_string()))
            .cloned()
    }

    pub fn snapshot(&self) -> HashMap<(String, String), SyncWatermark> {
        self.watermarks.read().clone()
    }
}

#[async_trait]
impl SyncHandler for SyncBookkeeper {
    async fn handle(&self, envelope: Arc<MeasurementEnvelope>) {
        let now = Utc::now();
        let points = envelope.data_points() as u64;
        let key = (envelope.db_name.clone(), envelope.metric_name.clone());

        let mut watermarks = self.watermarks.write();
        let entry = watermarks.entry(key).or_insert(SyncWatermark {
            envelopes: 0,
            data_points: 0,
            last_seen: now,
        });
        entry.envelopes += 1;
        entry.data_points += points;
        entry.last_seen = now;
    }
}
