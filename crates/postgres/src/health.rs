//! PostgreSQL health checks and schema initialization.

use crate::client::{pg_err, PostgresStore};
use sink_core::Result;
use tracing::{debug, error, info};

/// Check PostgreSQL connection health.
pub async fn check_connection(store: &PostgresStore) -> bool {
    let conn = match store.conn().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            return false;
        }
    };

    match conn.query_one("SELECT 1", &[]).await {
        Ok(_) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            false
        }
    }
}

/// Create the catalog, measurements, and insights tables if absent.
///
/// All DDL runs in one transaction so a partially created schema is never
/// left behind. Re-running against an existing schema is a no-op.
pub async fn init_schema(store: &PostgresStore) -> Result<()> {
    let mut conn = store.conn().await?;
    let client: &mut tokio_postgres::Client = &mut conn;

    let tx = client
        .transaction()
        .await
        .map_err(pg_err("failed to begin schema transaction"))?;

    for ddl in store.schema().ddl() {
        tx.batch_execute(ddl)
            .await
            .map_err(pg_err("failed to execute DDL"))?;
    }

    tx.commit()
        .await
        .map_err(pg_err("failed to commit schema"))?;

    let tables = store.schema().tables();
    info!(
        catalog = %tables.catalog,
        measurements = %tables.measurements,
        insights = %tables.insights,
        "PostgreSQL schema initialized"
    );
    Ok(())
}
