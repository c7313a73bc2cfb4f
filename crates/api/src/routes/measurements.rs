//! Measurement ingestion endpoint.
//!
//! Accepts one JSON envelope per request, as sent by the monitoring agent,
//! and passes it to the sink.

use axum::{body::Bytes, extract::State, Json};
use sink_core::{schema::validate_envelope_size, MeasurementEnvelope};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::response::{ApiError, IngestResponse};
use crate::state::AppState;

/// POST /measurements
pub async fn measurements_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let start = Instant::now();

    // Check payload size before parsing
    validate_envelope_size(&body).map_err(|e| {
        warn!(payload_size = body.len(), "Envelope too large");
        ApiError::from(e)
    })?;

    let envelope = MeasurementEnvelope::from_slice(&body).map_err(|e| {
        warn!("Failed to parse envelope: {}", e);
        ApiError::bad_request(e.to_string())
    })?;

    let db_name = envelope.db_name.clone();
    let metric_name = envelope.metric_name.clone();
    let received = envelope.data_points();

    debug!(
        db_name = %db_name,
        metric = %metric_name,
        payload_size = body.len(),
        "Received envelope"
    );

    let message = state.sink.update_measurements(envelope).await?;

    info!(
        db_name = %db_name,
        metric = %metric_name,
        data_points = received,
        latency_ms = start.elapsed().as_millis() as u64,
        "{}",
        message
    );

    Ok(Json(IngestResponse::success(received, message)))
}
