//! Measurement envelope as delivered by the monitoring agent.
//!
//! Field names on the wire match the agent's JSON encoding (`DBName`,
//! `MetricName`, `Data`, ...), so envelopes can be forwarded unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// One reported data point: an ordered key→value JSON object.
pub type DataPoint = serde_json::Map<String, serde_json::Value>;

/// Metric metadata attached to every envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDef {
    /// SQL per minimum server version
    #[serde(default)]
    pub sqls: BTreeMap<i32, String>,
    #[serde(default)]
    pub init_sql: String,
    #[serde(default)]
    pub node_status: String,
    #[serde(default)]
    pub gauges: Vec<String>,
    #[serde(default)]
    pub is_instance_level: bool,
    #[serde(default)]
    pub storage_name: String,
    #[serde(default)]
    pub description: String,
}

/// One delivered batch of metric data for a single database/metric/cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct MeasurementEnvelope {
    #[serde(rename = "DBName")]
    #[validate(length(min = 1, message = "empty database name"))]
    pub db_name: String,

    #[serde(default)]
    pub source_type: String,

    #[validate(length(min = 1, message = "empty metric name"))]
    pub metric_name: String,

    #[serde(default)]
    pub custom_tags: Option<BTreeMap<String, String>>,

    #[validate(length(min = 1, message = "no measurements in envelope"))]
    pub data: Vec<DataPoint>,

    #[serde(default)]
    pub metric_def: MetricDef,

    #[serde(default)]
    pub real_dbname: String,

    #[serde(default)]
    pub system_identifier: String,
}

impl MeasurementEnvelope {
    /// Number of data points carried by this envelope.
    pub fn data_points(&self) -> usize {
        self.data.len()
    }

    /// Custom tags encoded as JSON. Absent tags encode as `null`.
    pub fn tags_json(&self) -> serde_json::Value {
        match &self.custom_tags {
            Some(tags) => serde_json::Value::Object(
                tags.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
            None => serde_json::Value::Null,
        }
    }

    /// Parse an envelope from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
