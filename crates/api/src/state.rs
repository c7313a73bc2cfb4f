//! Application state shared across handlers.

use sink_core::MeasurementSink;
use std::sync::Arc;
use worker::{DrainGroup, InsightSink};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Sink behind `POST /measurements`
    pub sink: Arc<dyn MeasurementSink>,
    /// Outstanding insight tasks of that sink
    pub drain: DrainGroup,
}

impl AppState {
    pub fn from_insight_sink(sink: Arc<InsightSink>) -> Self {
        let drain = sink.drain().clone();
        Self { sink, drain }
    }
}
