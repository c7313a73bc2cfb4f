//! PostgreSQL client wrapper with connection pooling.

use crate::config::PostgresConfig;
use crate::schema::Schema;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use sink_core::{Error, MeasurementEnvelope, MeasurementRow, MeasurementStore, Result};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Pooled PostgreSQL store.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
    schema: Schema,
    config: PostgresConfig,
}

impl PostgresStore {
    /// Creates a new store.
    ///
    /// Table names are validated first; an invalid name fails here with a
    /// configuration error and no connection is attempted. The pool connects
    /// lazily on first use.
    pub fn new(config: PostgresConfig) -> Result<Self> {
        let schema = Schema::new(config.tables.clone())?;

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(Duration::from_secs(config.timeout_secs));

        let mut cfg = Config::new();
        cfg.url = Some(config.url.clone());
        cfg.pool = Some(pool_config);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::configuration(format!("failed to create pool: {}", e)))?;

        info!(
            pool_size = config.pool_size,
            catalog = %config.tables.catalog,
            measurements = %config.tables.measurements,
            insights = %config.tables.insights,
            "Created PostgreSQL store"
        );

        Ok(Self {
            pool,
            schema,
            config,
        })
    }

    /// Get a connection from the pool.
    pub(crate) async fn conn(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::storage(format!("failed to acquire connection: {}", e)))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Current pool size, for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }
}

/// Maps a driver error to a storage error, keeping the server message if any.
pub(crate) fn pg_err(context: &'static str) -> impl Fn(tokio_postgres::Error) -> Error {
    move |e| match e.as_db_error() {
        Some(db) => Error::storage(format!("{}: {} ({})", context, db.message(), db.code().code())),
        None => Error::storage(format!("{}: {}", context, e)),
    }
}

#[async_trait]
impl MeasurementStore for PostgresStore {
    async fn initialize_schema(&self) -> Result<()> {
        crate::health::init_schema(self).await
    }

    async fn insert_measurements(&self, envelope: &MeasurementEnvelope) -> Result<usize> {
        crate::insert::insert_envelope(self, envelope).await
    }

    async fn insert_insight(&self, db_name: &str, insight: &str) -> Result<()> {
        crate::insert::insert_insight(self, db_name, insight).await
    }

    async fn fetch_recent_measurements(
        &self,
        db_name: &str,
        window: usize,
    ) -> Result<Vec<MeasurementRow>> {
        crate::query::fetch_recent_measurements(self, db_name, window).await
    }
}
