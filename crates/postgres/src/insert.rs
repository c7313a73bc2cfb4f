//! Transactional inserts.

use crate::client::{pg_err, PostgresStore};
use chrono::Utc;
use sink_core::{MeasurementEnvelope, Result};
use telemetry::metrics;
use tracing::{debug, error};

/// Inserts every data point of an envelope in one transaction.
///
/// The catalog row is upserted in the same transaction. Any failure drops
/// the transaction uncommitted, which rolls back every row of the envelope.
pub async fn insert_envelope(store: &PostgresStore, envelope: &MeasurementEnvelope) -> Result<usize> {
    let start = std::time::Instant::now();

    let result = write_envelope(store, envelope).await;

    let elapsed = start.elapsed();
    metrics().store_latency_ms.observe(elapsed.as_millis() as u64);

    match result {
        Ok(count) => {
            metrics().measurements_inserted.inc_by(count as u64);
            debug!(
                db_name = %envelope.db_name,
                metric = %envelope.metric_name,
                count = count,
                latency_ms = %elapsed.as_millis(),
                "Inserted measurements"
            );
            Ok(count)
        }
        Err(e) => {
            metrics().storage_errors.inc();
            error!(
                db_name = %envelope.db_name,
                metric = %envelope.metric_name,
                error = %e,
                "Envelope insert rolled back"
            );
            Err(e)
        }
    }
}

async fn write_envelope(store: &PostgresStore, envelope: &MeasurementEnvelope) -> Result<usize> {
    let mut conn = store.conn().await?;
    let client: &mut tokio_postgres::Client = &mut conn;

    let tx = client
        .transaction()
        .await
        .map_err(pg_err("failed to begin transaction"))?;

    tx.execute(store.schema().upsert_catalog(), &[&envelope.db_name])
        .await
        .map_err(pg_err("failed to register database"))?;

    let stmt = tx
        .prepare(store.schema().insert_measurement())
        .await
        .map_err(pg_err("failed to prepare insert"))?;

    let tags = envelope.tags_json();
    let timestamp = Utc::now();

    for point in &envelope.data {
        let data = serde_json::Value::Object(point.clone());
        tx.execute(
            &stmt,
            &[
                &envelope.db_name,
                &envelope.metric_name,
                &data,
                &tags,
                &timestamp,
            ],
        )
        .await
        .map_err(pg_err("failed to insert measurement"))?;
    }

    tx.commit()
        .await
        .map_err(pg_err("failed to commit transaction"))?;

    Ok(envelope.data.len())
}

/// Appends one insight row for a database.
pub async fn insert_insight(store: &PostgresStore, db_name: &str, insight: &str) -> Result<()> {
    let mut conn = store.conn().await?;
    let client: &mut tokio_postgres::Client = &mut conn;

    let tx = client
        .transaction()
        .await
        .map_err(pg_err("failed to begin transaction"))?;

    tx.execute(store.schema().upsert_catalog(), &[&db_name])
        .await
        .map_err(pg_err("failed to register database"))?;

    tx.execute(store.schema().insert_insight(), &[&db_name, &insight, &Utc::now()])
        .await
        .map_err(pg_err("failed to insert insight"))?;

    tx.commit()
        .await
        .map_err(pg_err("failed to commit insight"))?;

    debug!(db_name = %db_name, chars = insight.len(), "Inserted insight");
    Ok(())
}
