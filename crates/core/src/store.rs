//! Storage collaborator used by the insight pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::MeasurementEnvelope;
use crate::error::Result;

/// A persisted measurement row (one per envelope data point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub db_name: String,
    pub metric_name: String,
    pub data: serde_json::Value,
    pub custom_tags: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// A persisted insight row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRow {
    pub db_name: String,
    pub insight: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable, transactional persistence for measurements and insights.
///
/// Implementations must tolerate concurrent use from request handlers and
/// background insight tasks.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Creates the catalog, measurement, and insight tables if absent.
    ///
    /// Calling this against an existing schema is a no-op.
    async fn initialize_schema(&self) -> Result<()>;

    /// Persists every data point of the envelope in a single transaction.
    ///
    /// Either all rows commit or none do. Returns the number of rows written.
    async fn insert_measurements(&self, envelope: &MeasurementEnvelope) -> Result<usize>;

    /// Appends one generated insight for a database.
    async fn insert_insight(&self, db_name: &str, insight: &str) -> Result<()>;

    /// Returns up to `window` of the most recent rows for a database, newest first.
    async fn fetch_recent_measurements(
        &self,
        db_name: &str,
        window: usize,
    ) -> Result<Vec<MeasurementRow>>;
}
