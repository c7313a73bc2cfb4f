//! Read paths: the synthesizer's recent window, plus operator/test helpers.

use crate::client::{pg_err, PostgresStore};
use sink_core::{Error, InsightRow, MeasurementRow, Result};
use tokio_postgres::Row;

fn measurement_from_row(row: &Row) -> Result<MeasurementRow> {
    let decode = |e: tokio_postgres::Error| Error::storage(format!("failed to decode row: {}", e));

    Ok(MeasurementRow {
        db_name: row.try_get(0).map_err(decode)?,
        metric_name: row.try_get(1).map_err(decode)?,
        data: row.try_get(2).map_err(decode)?,
        custom_tags: row
            .try_get::<_, Option<serde_json::Value>>(3)
            .map_err(decode)?
            .unwrap_or(serde_json::Value::Null),
        timestamp: row.try_get(4).map_err(decode)?,
    })
}

/// Most recent `window` measurement rows for a database, newest first.
pub async fn fetch_recent_measurements(
    store: &PostgresStore,
    db_name: &str,
    window: usize,
) -> Result<Vec<MeasurementRow>> {
    let conn = store.conn().await?;
    let limit = i64::try_from(window).unwrap_or(i64::MAX);

    let rows = conn
        .query(store.schema().recent_measurements(), &[&db_name, &limit])
        .await
        .map_err(pg_err("failed to fetch recent measurements"))?;

    rows.iter().map(measurement_from_row).collect()
}

/// Count measurement rows for a database.
pub async fn count_measurements(store: &PostgresStore, db_name: &str) -> Result<i64> {
    let table = store.schema().tables().measurements.clone();
    count_rows(store, &table, db_name).await
}

/// Count insight rows for a database.
pub async fn count_insights(store: &PostgresStore, db_name: &str) -> Result<i64> {
    let table = store.schema().tables().insights.clone();
    count_rows(store, &table, db_name).await
}

async fn count_rows(store: &PostgresStore, table: &str, db_name: &str) -> Result<i64> {
    let conn = store.conn().await?;
    let row = conn
        .query_one(&store.schema().count_for_db(table), &[&db_name])
        .await
        .map_err(pg_err("failed to count rows"))?;
    row.try_get(0)
        .map_err(|e| Error::storage(format!("failed to decode count: {}", e)))
}

/// Latest insights for a database, newest first.
pub async fn fetch_insights(
    store: &PostgresStore,
    db_name: &str,
    limit: i64,
) -> Result<Vec<InsightRow>> {
    let conn = store.conn().await?;
    let rows = conn
        .query(&store.schema().latest_insights(), &[&db_name, &limit])
        .await
        .map_err(pg_err("failed to fetch insights"))?;

    rows.iter()
        .map(|row| -> Result<InsightRow> {
            Ok(InsightRow {
                db_name: row.try_get(0).map_err(pg_err("failed to decode insight"))?,
                insight: row.try_get(1).map_err(pg_err("failed to decode insight"))?,
                timestamp: row.try_get(2).map_err(pg_err("failed to decode insight"))?,
            })
        })
        .collect()
}

/// Whether a table with this name exists in any visible schema.
pub async fn table_exists(store: &PostgresStore, table: &str) -> Result<bool> {
    let conn = store.conn().await?;
    let row = conn
        .query_one(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
            &[&table],
        )
        .await
        .map_err(pg_err("failed to check table"))?;
    row.try_get(0)
        .map_err(|e| Error::storage(format!("failed to decode exists: {}", e)))
}

/// Number of tables named `table` (detects duplicates across schemas).
pub async fn count_tables_named(store: &PostgresStore, table: &str) -> Result<i64> {
    let conn = store.conn().await?;
    let row = conn
        .query_one(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = $1",
            &[&table],
        )
        .await
        .map_err(pg_err("failed to count tables"))?;
    row.try_get(0)
        .map_err(|e| Error::storage(format!("failed to decode count: {}", e)))
}

/// Remove all rows from the three tables (test cleanup).
pub async fn truncate_all(store: &PostgresStore) -> Result<()> {
    let conn = store.conn().await?;
    conn.batch_execute(&store.schema().truncate_all())
        .await
        .map_err(pg_err("failed to truncate tables"))?;
    Ok(())
}
