//! Insight synthesis.
//!
//! A triggered database gets one background task that:
//! 1. Fetches the most recent measurements
//! 2. Builds a prompt from them
//! 3. Calls the model under a deadline
//! 4. Stores the trimmed completion as an insight
//!
//! Failures are logged and counted, never retried.

use sink_core::{Error, InsightModel, MeasurementRow, MeasurementStore, Result};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::accumulator::TriggerPermit;
use crate::config::InsightConfig;
use crate::drain::DrainToken;

pub struct InsightSynthesizer {
    store: Arc<dyn MeasurementStore>,
    model: Arc<dyn InsightModel>,
    config: InsightConfig,
}

impl InsightSynthesizer {
    pub fn new(
        store: Arc<dyn MeasurementStore>,
        model: Arc<dyn InsightModel>,
        config: InsightConfig,
    ) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    /// Runs generations for a triggered database in the background.
    ///
    /// After each generation the permit is renewed if the threshold was
    /// crossed again meanwhile, and the task goes another round. The drain
    /// token is held across rounds and dropped after the permit, so once a
    /// drain wait returns the database is free to trigger again.
    pub fn spawn(self: &Arc<Self>, permit: TriggerPermit, token: DrainToken) -> JoinHandle<()> {
        let this = self.clone();
        let task = metrics().outstanding_insight_tasks.track();

        tokio::spawn(async move {
            let db_name = permit.db_name().to_string();
            let mut permit = permit;

            loop {
                this.run_once(&db_name).await;

                match permit.renew() {
                    Some(next) => {
                        metrics().insights_triggered.inc();
                        debug!(db_name = %db_name, "Insight re-triggered by pending points");
                        permit = next;
                    }
                    None => break,
                }
            }

            drop(token);
            drop(task);
        })
    }

    async fn run_once(&self, db_name: &str) {
        match self.generate(db_name).await {
            Ok(insight) => {
                metrics().insights_generated.inc();
                info!(
                    db_name = %db_name,
                    model = self.model.name(),
                    chars = insight.len(),
                    "Insight stored"
                );
            }
            Err(e) => {
                metrics().generation_errors.inc();
                error!(db_name = %db_name, error = %e, "Insight generation failed");
            }
        }
    }

    /// Generates and stores one insight for `db_name`, returning its text.
    pub async fn generate(&self, db_name: &str) -> Result<String> {
        let rows = self
            .store
            .fetch_recent_measurements(db_name, self.config.window)
            .await?;
        if rows.is_empty() {
            return Err(Error::generation(format!(
                "no measurements stored for {}",
                db_name
            )));
        }

        let prompt = build_prompt(db_name, &rows);
        debug!(db_name = %db_name, rows = rows.len(), "Prompt built");

        let started = Instant::now();
        let completion =
            tokio::time::timeout(self.config.model_timeout(), self.model.generate(&prompt)).await;
        metrics()
            .model_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        let completion = match completion {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::generation(format!(
                    "model {} timed out after {}s",
                    self.model.name(),
                    self.config.model_timeout_secs
                )))
            }
        };

        let insight = completion.trim();
        if insight.is_empty() {
            return Err(Error::generation(format!(
                "model {} returned an empty insight",
                self.model.name()
            )));
        }

        self.store.insert_insight(db_name, insight).await?;
        Ok(insight.to_string())
    }
}

/// Renders recent measurements (given newest first) as a prompt, oldest first.
pub fn build_prompt(db_name: &str, rows: &[MeasurementRow]) -> String {
    let mut prompt = format!(
        "You are a PostgreSQL monitoring assistant. Below are the {} most recent \
         measurements collected for database \"{}\", oldest first. Each line is \
         <timestamp> <metric> <data> [tags].\n\n",
        rows.len(),
        db_name
    );

    for row in rows.iter().rev() {
        let _ = write!(
            prompt,
            "{} {} {}",
            row.timestamp.to_rfc3339(),
            row.metric_name,
            row.data
        );
        if !row.custom_tags.is_null() {
            let _ = write!(prompt, " {}", row.custom_tags);
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "\nSummarize the state of this database in a few sentences. Point out \
         anything unusual and suggest what an operator should look at first.",
    );
    prompt
}
