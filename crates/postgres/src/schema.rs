//! Table schemas and generated statements.
//!
//! Three tables:
//! - catalog: one row per database ever seen
//! - measurements: one row per reported data point (append-only)
//! - insights: one row per generated insight (append-only)
//!
//! Every identifier is validated before any statement text is built, and
//! every value is bound as a parameter.

use sink_core::schema::validate_identifier;
use sink_core::Result;

use crate::config::TableNames;

/// Column names. Fixed, but still validated with the table names.
pub const COL_ID: &str = "id";
pub const COL_DBNAME: &str = "dbname";
pub const COL_METRIC_NAME: &str = "metric_name";
pub const COL_DATA: &str = "data";
pub const COL_CUSTOM_TAGS: &str = "custom_tags";
pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_INSIGHT: &str = "insight";
pub const COL_CREATED_AT: &str = "created_at";

const COLUMNS: [&str; 8] = [
    COL_ID,
    COL_DBNAME,
    COL_METRIC_NAME,
    COL_DATA,
    COL_CUSTOM_TAGS,
    COL_TIMESTAMP,
    COL_INSIGHT,
    COL_CREATED_AT,
];

/// Quotes an identifier that has already passed the allow-list.
fn q(ident: &str) -> String {
    format!("\"{}\"", ident)
}

/// Validated schema with precomputed statement text.
#[derive(Debug, Clone)]
pub struct Schema {
    tables: TableNames,
    ddl: Vec<String>,
    upsert_catalog: String,
    insert_measurement: String,
    insert_insight: String,
    recent_measurements: String,
}

impl Schema {
    /// Validates all identifiers and builds the statements.
    ///
    /// Fails with a configuration error before any SQL is issued.
    pub fn new(tables: TableNames) -> Result<Self> {
        validate_identifier("catalog table", &tables.catalog)?;
        validate_identifier("measurements table", &tables.measurements)?;
        validate_identifier("insights table", &tables.insights)?;
        for column in COLUMNS {
            validate_identifier("column", column)?;
        }

        let catalog = q(&tables.catalog);
        let measurements = q(&tables.measurements);
        let insights = q(&tables.insights);
        let index = q(&format!("{}_dbname_timestamp_idx", tables.measurements));

        let ddl = vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {catalog} (
    {id} BIGSERIAL PRIMARY KEY,
    {dbname} TEXT NOT NULL UNIQUE,
    {created_at} TIMESTAMPTZ NOT NULL DEFAULT now()
)",
                id = q(COL_ID),
                dbname = q(COL_DBNAME),
                created_at = q(COL_CREATED_AT),
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {measurements} (
    {id} BIGSERIAL PRIMARY KEY,
    {dbname} TEXT NOT NULL REFERENCES {catalog} ({dbname}),
    {metric_name} TEXT NOT NULL,
    {data} JSONB NOT NULL,
    {custom_tags} JSONB,
    {timestamp} TIMESTAMPTZ NOT NULL DEFAULT now()
)",
                id = q(COL_ID),
                dbname = q(COL_DBNAME),
                metric_name = q(COL_METRIC_NAME),
                data = q(COL_DATA),
                custom_tags = q(COL_CUSTOM_TAGS),
                timestamp = q(COL_TIMESTAMP),
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {measurements} ({dbname}, {timestamp} DESC)",
                dbname = q(COL_DBNAME),
                timestamp = q(COL_TIMESTAMP),
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {insights} (
    {id} BIGSERIAL PRIMARY KEY,
    {dbname} TEXT NOT NULL REFERENCES {catalog} ({dbname}),
    {insight} TEXT NOT NULL,
    {timestamp} TIMESTAMPTZ NOT NULL DEFAULT now()
)",
                id = q(COL_ID),
                dbname = q(COL_DBNAME),
                insight = q(COL_INSIGHT),
                timestamp = q(COL_TIMESTAMP),
            ),
        ];

        let upsert_catalog = format!(
            "INSERT INTO {catalog} ({dbname}) VALUES ($1) ON CONFLICT ({dbname}) DO NOTHING",
            dbname = q(COL_DBNAME),
        );

        let insert_measurement = format!(
            "INSERT INTO {measurements} ({dbname}, {metric_name}, {data}, {custom_tags}, {timestamp}) \
             VALUES ($1, $2, $3, $4, $5)",
            dbname = q(COL_DBNAME),
            metric_name = q(COL_METRIC_NAME),
            data = q(COL_DATA),
            custom_tags = q(COL_CUSTOM_TAGS),
            timestamp = q(COL_TIMESTAMP),
        );

        let insert_insight = format!(
            "INSERT INTO {insights} ({dbname}, {insight}, {timestamp}) VALUES ($1, $2, $3)",
            dbname = q(COL_DBNAME),
            insight = q(COL_INSIGHT),
            timestamp = q(COL_TIMESTAMP),
        );

        let recent_measurements = format!(
            "SELECT {dbname}, {metric_name}, {data}, {custom_tags}, {timestamp} FROM {measurements} \
             WHERE {dbname} = $1 ORDER BY {timestamp} DESC, {id} DESC LIMIT $2",
            dbname = q(COL_DBNAME),
            metric_name = q(COL_METRIC_NAME),
            data = q(COL_DATA),
            custom_tags = q(COL_CUSTOM_TAGS),
            timestamp = q(COL_TIMESTAMP),
            id = q(COL_ID),
        );

        Ok(Self {
            tables,
            ddl,
            upsert_catalog,
            insert_measurement,
            insert_insight,
            recent_measurements,
        })
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// DDL statements in dependency order (catalog first).
    pub fn ddl(&self) -> &[String] {
        &self.ddl
    }

    pub fn upsert_catalog(&self) -> &str {
        &self.upsert_catalog
    }

    pub fn insert_measurement(&self) -> &str {
        &self.insert_measurement
    }

    pub fn insert_insight(&self) -> &str {
        &self.insert_insight
    }

    pub fn recent_measurements(&self) -> &str {
        &self.recent_measurements
    }

    /// `SELECT COUNT(*)` for one database in the given (already validated) table.
    pub(crate) fn count_for_db(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            q(table),
            q(COL_DBNAME)
        )
    }

    pub(crate) fn latest_insights(&self) -> String {
        format!(
            "SELECT {dbname}, {insight}, {timestamp} FROM {insights} \
             WHERE {dbname} = $1 ORDER BY {timestamp} DESC, {id} DESC LIMIT $2",
            dbname = q(COL_DBNAME),
            insight = q(COL_INSIGHT),
            timestamp = q(COL_TIMESTAMP),
            id = q(COL_ID),
            insights = q(&self.tables.insights),
        )
    }

    /// Truncates all three tables (test cleanup).
    pub(crate) fn truncate_all(&self) -> String {
        format!(
            "TRUNCATE TABLE {}, {}, {} RESTART IDENTITY",
            q(&self.tables.insights),
            q(&self.tables.measurements),
            q(&self.tables.catalog)
        )
    }
}
