//! Pipeline tests for the insight sink.
//!
//! Run the real sink (accumulator, handoff, synthesizer, drain) over the
//! in-memory store and scripted model. No Docker required.

use integration_tests::{
    fixtures,
    mocks::{MemoryStore, MockModel},
    setup::{test_config, wait_until, TestContext},
};
use serde_json::{json, Value};
use sink_core::{Error, MeasurementSink};
use std::sync::Arc;
use std::time::Duration;
use worker::{sink::SUCCESS_MESSAGE, InsightSink};

/// batch_size 1, one envelope: exactly one insight.
#[tokio::test]
async fn test_single_envelope_single_insight() {
    let ctx = TestContext::new(test_config(1)).await;

    let msg = ctx
        .sink
        .update_measurements(fixtures::envelope("test", "health", 1))
        .await
        .unwrap();
    assert_eq!(msg, SUCCESS_MESSAGE);

    ctx.sink.drain().wait().await;

    let insights = ctx.store.insights("test");
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].insight, "Database looks healthy.");
    assert_eq!(ctx.sink.drain().outstanding(), 0);
}

/// batch_size 1, ten sequential one-point envelopes.
#[tokio::test]
async fn test_sequential_envelopes_bounded_insights() {
    let ctx = TestContext::new(test_config(1)).await;
    ctx.model.set_delay(Duration::from_millis(20));

    for _ in 0..10 {
        ctx.sink
            .update_measurements(fixtures::envelope("test", "health", 1))
            .await
            .unwrap();
    }
    ctx.sink.drain().wait().await;

    let count = ctx.store.insights("test").len();
    assert!(count > 0 && count <= 10, "got {} insights", count);
    assert_eq!(ctx.model.calls(), count);
    assert_eq!(ctx.store.measurements("test").len(), 10);
    assert_eq!(ctx.sink.pending("test"), 0);
}

/// batch_size 10, ten sequential one-point envelopes: one insight.
#[tokio::test]
async fn test_threshold_reached_across_envelopes() {
    let ctx = TestContext::new(test_config(10)).await;

    for _ in 0..10 {
        ctx.sink
            .update_measurements(fixtures::envelope("test", "health", 1))
            .await
            .unwrap();
    }
    ctx.sink.drain().wait().await;

    assert_eq!(ctx.store.insights("test").len(), 1);
    assert_eq!(ctx.sink.pending("test"), 0);
}

/// Every data point becomes one row with its payload and tags verbatim.
#[tokio::test]
async fn test_rows_stored_verbatim() {
    let ctx = TestContext::new(test_config(100)).await;
    let envelope = fixtures::tagged_envelope("db1", "cpu", 5);

    ctx.sink.update_measurements(envelope.clone()).await.unwrap();

    let rows = ctx.store.measurements("db1");
    assert_eq!(rows.len(), 5);
    for (row, point) in rows.iter().zip(&envelope.data) {
        assert_eq!(row.metric_name, "cpu");
        assert_eq!(row.data, Value::Object(point.clone()));
        assert_eq!(row.custom_tags, json!({"env": "prod", "region": "eu-west-1"}));
    }
    assert_eq!(ctx.sink.pending("db1"), 5);
}

#[tokio::test]
async fn test_validation_failure_changes_nothing() {
    let ctx = TestContext::new(test_config(1)).await;

    let mut no_db = fixtures::envelope("", "cpu", 3);
    no_db.real_dbname = "real".into();
    let err = ctx.sink.update_measurements(no_db).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.to_string(), "empty database name");

    let no_metric = fixtures::envelope("db1", "", 3);
    let err = ctx.sink.update_measurements(no_metric).await.unwrap_err();
    assert_eq!(err.to_string(), "empty metric name");

    let no_data = fixtures::envelope("db1", "cpu", 0);
    let err = ctx.sink.update_measurements(no_data).await.unwrap_err();
    assert_eq!(err.to_string(), "no measurements in envelope");

    ctx.sink.drain().wait().await;
    assert_eq!(ctx.store.measurement_count(), 0);
    assert_eq!(ctx.store.insight_count(), 0);
    assert_eq!(ctx.sink.pending("db1"), 0);
    assert_eq!(ctx.model.calls(), 0);
    assert!(ctx.sink.sync_watermarks().is_empty());
}

#[tokio::test]
async fn test_storage_failure_does_not_count() {
    let ctx = TestContext::new(test_config(2)).await;
    ctx.store.set_fail_measurements(true);

    let err = ctx
        .sink
        .update_measurements(fixtures::envelope("db1", "cpu", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(err.is_retryable());

    assert_eq!(ctx.sink.pending("db1"), 0);
    assert_eq!(ctx.sink.drain().outstanding(), 0);
    assert_eq!(ctx.model.calls(), 0);
}

/// Two envelopes crossing the threshold together spawn one task.
#[tokio::test]
async fn test_concurrent_crossing_spawns_one_task() {
    let ctx = TestContext::new(test_config(10)).await;
    ctx.model.set_delay(Duration::from_millis(500));

    let (a, b) = tokio::join!(
        ctx.sink.update_measurements(fixtures::envelope("db1", "cpu", 5)),
        ctx.sink.update_measurements(fixtures::envelope("db1", "cpu", 5)),
    );
    a.unwrap();
    b.unwrap();

    ctx.sink.drain().wait().await;
    assert_eq!(ctx.model.calls(), 1);
    assert_eq!(ctx.store.insights("db1").len(), 1);
    assert_eq!(ctx.sink.pending("db1"), 0);
}

/// While a task runs, points keep accumulating without a second trigger.
/// The running task picks up the backlog when it finishes.
#[tokio::test]
async fn test_one_task_in_flight_per_database() {
    let ctx = TestContext::new(test_config(10)).await;
    ctx.model.set_delay(Duration::from_millis(500));

    let sends = (0..8).map(|_| {
        let sink = ctx.sink.clone();
        tokio::spawn(async move {
            sink.update_measurements(fixtures::envelope("db1", "cpu", 5))
                .await
        })
    });
    for handle in sends.collect::<Vec<_>>() {
        handle.await.unwrap().unwrap();
    }

    // 40 points: 10 consumed by the trigger, the other 30 by one follow-up
    assert_eq!(ctx.sink.drain().outstanding(), 1);
    assert_eq!(ctx.model.calls(), 1);
    assert_eq!(ctx.sink.pending("db1"), 30);

    ctx.sink.drain().wait().await;
    assert_eq!(ctx.model.calls(), 2);
    assert_eq!(ctx.store.insights("db1").len(), 2);
    assert_eq!(ctx.sink.pending("db1"), 0);
}

/// A crossing deferred behind a running task is not lost when no further
/// envelope arrives, even if the running task fails.
#[tokio::test]
async fn test_deferred_crossing_generates_without_new_envelope() {
    let ctx = TestContext::new(test_config(10)).await;
    ctx.model.set_delay(Duration::from_millis(300));
    ctx.model.set_should_fail(true);

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 10))
        .await
        .unwrap();
    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 10))
        .await
        .unwrap();
    assert_eq!(ctx.sink.pending("db1"), 10);

    ctx.sink.drain().wait().await;
    // Both windows reached the model, neither produced an insight
    assert_eq!(ctx.model.calls(), 2);
    assert_eq!(ctx.store.insight_count(), 0);
    assert_eq!(ctx.sink.pending("db1"), 0);
    assert_eq!(ctx.sink.drain().outstanding(), 0);
}

#[tokio::test]
async fn test_databases_trigger_independently() {
    let ctx = TestContext::new(test_config(3)).await;

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 3))
        .await
        .unwrap();
    ctx.sink
        .update_measurements(fixtures::envelope("db2", "cpu", 2))
        .await
        .unwrap();
    ctx.sink.drain().wait().await;

    assert_eq!(ctx.store.insights("db1").len(), 1);
    assert!(ctx.store.insights("db2").is_empty());
    assert_eq!(ctx.sink.pending("db2"), 2);
}

#[tokio::test]
async fn test_model_failure_leaves_no_insight() {
    let ctx = TestContext::new(test_config(1)).await;
    ctx.model.set_should_fail(true);

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    assert!(ctx.sink.drain().wait_timeout(Duration::from_secs(5)).await);
    assert_eq!(ctx.store.insight_count(), 0);

    // Not retried, but the next trigger works
    ctx.model.set_should_fail(false);
    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    ctx.sink.drain().wait().await;
    assert_eq!(ctx.store.insight_count(), 1);
    assert_eq!(ctx.model.calls(), 2);
}

#[tokio::test]
async fn test_model_timeout_leaves_no_insight() {
    let mut config = test_config(1);
    config.model_timeout_secs = 1;
    let ctx = TestContext::new(config).await;
    ctx.model.set_delay(Duration::from_secs(10));

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    assert_eq!(ctx.sink.drain().outstanding(), 1);

    assert!(ctx.sink.drain().wait_timeout(Duration::from_secs(5)).await);
    assert_eq!(ctx.store.insight_count(), 0);
}

#[tokio::test]
async fn test_blank_completion_is_discarded() {
    let ctx = TestContext::new(test_config(1)).await;
    ctx.model.set_reply("  \n\t ");

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    ctx.sink.drain().wait().await;
    assert_eq!(ctx.store.insight_count(), 0);
}

#[tokio::test]
async fn test_completion_is_trimmed() {
    let ctx = TestContext::new(test_config(1)).await;
    ctx.model.set_reply("\n  Replication lag is growing.  \n");

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    ctx.sink.drain().wait().await;
    assert_eq!(
        ctx.store.insights("db1")[0].insight,
        "Replication lag is growing."
    );
}

#[tokio::test]
async fn test_insight_write_failure_is_contained() {
    let ctx = TestContext::new(test_config(1)).await;
    ctx.store.set_fail_insights(true);

    let msg = ctx
        .sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    assert_eq!(msg, SUCCESS_MESSAGE);
    assert!(ctx.sink.drain().wait_timeout(Duration::from_secs(5)).await);
    assert_eq!(ctx.store.insight_count(), 0);
}

#[tokio::test]
async fn test_prompt_uses_recent_window() {
    let ctx = TestContext::new(test_config(30)).await;

    ctx.sink
        .update_measurements(fixtures::envelope("db1", "wal_stats", 30))
        .await
        .unwrap();
    ctx.sink.drain().wait().await;

    let prompts = ctx.model.prompts();
    assert_eq!(prompts.len(), 1);
    // Window is 20 in the test config
    assert!(prompts[0].contains("20 most recent"));
    assert!(prompts[0].contains("\"db1\""));
    assert!(prompts[0].contains("wal_stats"));
    // Oldest rows fall outside the window
    assert!(!prompts[0].contains("\"seq\":9,") && !prompts[0].contains("\"seq\":9}"));
    assert!(prompts[0].contains("\"seq\":10") && prompts[0].contains("\"seq\":29"));
}

#[tokio::test]
async fn test_handoff_tracks_watermarks() {
    let ctx = TestContext::new(test_config(100)).await;

    for points in [2, 3, 4] {
        ctx.sink
            .update_measurements(fixtures::envelope("db1", "cpu", points))
            .await
            .unwrap();
    }
    ctx.sink
        .update_measurements(fixtures::envelope("db1", "memory", 1))
        .await
        .unwrap();

    let key = ("db1".to_string(), "cpu".to_string());
    let sink = ctx.sink.clone();
    let synced = wait_until(Duration::from_secs(2), || {
        let sink = sink.clone();
        let key = key.clone();
        async move {
            sink.sync_watermarks()
                .get(&key)
                .map(|w| w.envelopes == 3)
                .unwrap_or(false)
        }
    })
    .await;
    assert!(synced);

    let watermarks = ctx.sink.sync_watermarks();
    assert_eq!(watermarks[&key].data_points, 9);
    assert!(wait_until(Duration::from_secs(2), || {
        let sink = sink.clone();
        async move { sink.sync_watermarks().len() == 2 }
    })
    .await);
}

#[tokio::test]
async fn test_sink_construction() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockModel::default());

    let result = InsightSink::new(store.clone(), model.clone(), test_config(0)).await;
    assert!(matches!(result, Err(Error::Configuration(_))));
    // Config is checked before touching the store
    assert_eq!(store.schema_inits(), 0);

    let sink = InsightSink::new(store.clone(), model, test_config(5)).await;
    assert!(sink.is_ok());
    assert_eq!(store.schema_inits(), 1);
}

/// Sinks do not share drain state.
#[tokio::test]
async fn test_drain_is_per_sink() {
    let slow = TestContext::new(test_config(1)).await;
    let fast = TestContext::new(test_config(1)).await;
    slow.model.set_delay(Duration::from_millis(500));

    slow.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();
    fast.sink
        .update_measurements(fixtures::envelope("db1", "cpu", 1))
        .await
        .unwrap();

    fast.sink.drain().wait().await;
    assert_eq!(fast.store.insight_count(), 1);
    assert_eq!(slow.sink.drain().outstanding(), 1);

    slow.sink.drain().wait().await;
    assert_eq!(slow.store.insight_count(), 1);
}
