//! PostgreSQL store tests.
//!
//! Requires Docker, or `INSIGHT_SINK_TEST_POSTGRES_URL` pointing at a
//! scratch database. Run with `cargo test -- --ignored`.

use integration_tests::{
    fixtures,
    setup::{test_config, PostgresContext},
};
use postgres_store::{
    count_insights, count_measurements, count_tables_named, fetch_insights, table_exists,
};
use serde_json::{json, Value};
use sink_core::{Error, MeasurementSink, MeasurementStore};

#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_schema_init_is_idempotent() {
    let ctx = PostgresContext::new("idem", test_config(10)).await;

    // Already run once by the sink
    ctx.store.initialize_schema().await.unwrap();
    ctx.store.initialize_schema().await.unwrap();

    for table in ["idem_db", "idem_measurements", "idem_insights"] {
        assert!(table_exists(&ctx.store, table).await.unwrap(), "{} missing", table);
        assert_eq!(count_tables_named(&ctx.store, table).await.unwrap(), 1);
    }
}

#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_envelope_rows_stored_verbatim() {
    let ctx = PostgresContext::new("verbatim", test_config(100)).await;
    let envelope = fixtures::tagged_envelope("db1", "cpu", 5);

    ctx.sink.update_measurements(envelope.clone()).await.unwrap();

    assert_eq!(count_measurements(&ctx.store, "db1").await.unwrap(), 5);

    let mut rows = ctx.store.fetch_recent_measurements("db1", 50).await.unwrap();
    assert_eq!(rows.len(), 5);
    rows.sort_by_key(|row| row.data["seq"].as_u64());
    for (row, point) in rows.iter().zip(&envelope.data) {
        assert_eq!(row.metric_name, "cpu");
        assert_eq!(row.data, Value::Object(point.clone()));
        assert_eq!(row.custom_tags, json!({"env": "prod", "region": "eu-west-1"}));
    }
}

#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_absent_tags_read_back_as_null() {
    let ctx = PostgresContext::new("notags", test_config(100)).await;

    ctx.store
        .insert_measurements(&fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();

    let rows = ctx.store.fetch_recent_measurements("db1", 1).await.unwrap();
    assert_eq!(rows[0].custom_tags, Value::Null);
}

/// A failing row rolls back the rows before it.
#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_failed_row_rolls_back_envelope() {
    let ctx = PostgresContext::new("rollback", test_config(100)).await;

    let mut envelope = fixtures::envelope("db1", "cpu", 4);
    // jsonb rejects the NUL code point
    envelope.data[2].insert("query".into(), json!("select \u{0000}"));

    let err = ctx.store.insert_measurements(&envelope).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(count_measurements(&ctx.store, "db1").await.unwrap(), 0);

    // The same envelope without the bad value goes through
    envelope.data[2].remove("query");
    assert_eq!(ctx.store.insert_measurements(&envelope).await.unwrap(), 4);
    assert_eq!(count_measurements(&ctx.store, "db1").await.unwrap(), 4);
}

#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_insight_written_after_drain() {
    let ctx = PostgresContext::new("insight", test_config(1)).await;
    ctx.model.set_reply("Checkpoints are frequent.");

    ctx.sink
        .update_measurements(fixtures::envelope("test", "health", 1))
        .await
        .unwrap();
    ctx.sink.drain().wait().await;

    assert_eq!(count_insights(&ctx.store, "test").await.unwrap(), 1);
    let insights = fetch_insights(&ctx.store, "test", 10).await.unwrap();
    assert_eq!(insights[0].insight, "Checkpoints are frequent.");
    assert!(ctx.model.prompts()[0].contains("health"));
}

#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_sequential_envelopes_against_postgres() {
    let ctx = PostgresContext::new("sequential", test_config(1)).await;

    for _ in 0..10 {
        ctx.sink
            .update_measurements(fixtures::envelope("test", "health", 1))
            .await
            .unwrap();
    }
    ctx.sink.drain().wait().await;

    let insights = count_insights(&ctx.store, "test").await.unwrap();
    assert!(insights > 0 && insights <= 10, "got {} insights", insights);
    assert_eq!(ctx.model.calls() as i64, insights);
    assert_eq!(count_measurements(&ctx.store, "test").await.unwrap(), 10);
}

#[tokio::test]
#[ignore = "requires Docker or INSIGHT_SINK_TEST_POSTGRES_URL"]
async fn test_recent_window_newest_first() {
    let ctx = PostgresContext::new("window", test_config(100)).await;

    for points in [3, 3] {
        ctx.store
            .insert_measurements(&fixtures::envelope("db1", "cpu", points))
            .await
            .unwrap();
    }
    ctx.store
        .insert_measurements(&fixtures::envelope("db2", "cpu", 2))
        .await
        .unwrap();

    let rows = ctx.store.fetch_recent_measurements("db1", 4).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row.db_name == "db1"));
    assert!(rows.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}
