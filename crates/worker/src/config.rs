//! Insight pipeline configuration.

use serde::{Deserialize, Serialize};
use sink_core::limits::{
    DEFAULT_BATCH_SIZE, DEFAULT_HANDOFF_CAPACITY, DEFAULT_MODEL_TIMEOUT_SECS,
    DEFAULT_PROMPT_WINDOW,
};
use sink_core::{Error, Result};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Data points per database that trigger one insight.
    pub batch_size: u64,
    /// Recent measurement rows fed into each prompt.
    pub window: usize,
    /// Deadline for one model call.
    pub model_timeout_secs: u64,
    /// Capacity of the ingestion handoff queue.
    pub handoff_capacity: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            window: DEFAULT_PROMPT_WINDOW,
            model_timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
        }
    }
}

impl InsightConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::configuration("batch_size must be positive"));
        }
        if self.window == 0 {
            return Err(Error::configuration("window must be positive"));
        }
        if self.model_timeout_secs == 0 {
            return Err(Error::configuration("model_timeout_secs must be positive"));
        }
        if self.handoff_capacity == 0 {
            return Err(Error::configuration("handoff_capacity must be positive"));
        }
        Ok(())
    }
}
