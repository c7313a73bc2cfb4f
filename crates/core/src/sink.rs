//! Ingestion boundary shared by every sink.

use async_trait::async_trait;

use crate::envelope::MeasurementEnvelope;
use crate::error::Result;

/// A component that durably stores or forwards accepted envelopes.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    /// Accepts one envelope.
    ///
    /// Returns a log message on success. Errors carry the human-readable
    /// failure in their `Display` output.
    async fn update_measurements(&self, envelope: MeasurementEnvelope) -> Result<String>;
}
