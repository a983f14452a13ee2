//! PostgreSQL table store
//!
//! Datasets map to Postgres schemas. Tables are created with
//! `CREATE TABLE IF NOT EXISTS`, and each batch is inserted as one
//! `jsonb_populate_recordset` statement.
//!
//! `IF NOT EXISTS` still fails when two sessions create the same object at the
//! same moment: the loser sees a unique violation on the catalog (`23505`) or
//! a duplicate schema/table error (`42P06`, `42P07`). Those are reported as
//! [`IngestError::TableExists`].

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{InsertError, TableStore};
use crate::config::{is_identifier, DatabaseConfig};
use crate::error::{IngestError, Result};
use crate::schema::{Record, TableSchema};

#[derive(Clone)]
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool using `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        info!("Database connection pool established");

        Ok(Self::new(pool))
    }

    /// Build a pool that connects on first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy(&config.url)?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Double-quoted identifier; names outside `[A-Za-z0-9_]` are rejected
fn quote_ident(name: &str) -> Result<String> {
    if !is_identifier(name) {
        return Err(IngestError::Warehouse(format!("Invalid identifier: '{}'", name)));
    }
    Ok(format!("\"{}\"", name))
}

/// SQLSTATE codes raised by a lost `CREATE ... IF NOT EXISTS` race
const DUPLICATE_OBJECT_CODES: [&str; 3] = ["23505", "42P06", "42P07"];

fn is_duplicate_object(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| DUPLICATE_OBJECT_CODES.contains(&code.as_ref())),
        _ => false,
    }
}

/// `TableExists` when a table creation lost a race, `None` for any other failure
fn map_create_error(err: &sqlx::Error, dataset: &str, table: &str) -> Option<IngestError> {
    is_duplicate_object(err).then(|| IngestError::TableExists {
        dataset: dataset.to_string(),
        table: table.to_string(),
    })
}

fn qualified_name(dataset: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(dataset)?, quote_ident(table)?))
}

pub(crate) fn create_table_sql(dataset: &str, schema: &TableSchema) -> Result<String> {
    let columns = schema
        .fields
        .iter()
        .map(|field| Ok(format!("{} {}", quote_ident(field.name)?, field.field_type.sql_type())))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_name(dataset, schema.name)?,
        columns.join(", ")
    ))
}

pub(crate) fn insert_sql(dataset: &str, table: &str) -> Result<String> {
    let target = qualified_name(dataset, table)?;
    Ok(format!(
        "INSERT INTO {target} SELECT * FROM jsonb_populate_recordset(NULL::{target}, $1)"
    ))
}

#[async_trait]
impl TableStore for PgTableStore {
    #[instrument(skip(self))]
    async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(dataset)
        .bind(table)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(skip(self, schema), fields(table = schema.name))]
    async fn create_table(&self, dataset: &str, schema: &TableSchema) -> Result<()> {
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(dataset)?);
        match sqlx::query(&create_schema).execute(&self.pool).await {
            Ok(_) => {},
            // The schema is there either way; the table still has to be created
            Err(e) if is_duplicate_object(&e) => {
                debug!("Schema {} was created concurrently", dataset);
            },
            Err(e) => return Err(e.into()),
        }

        let create_table = create_table_sql(dataset, schema)?;
        debug!("{}", create_table);
        if let Err(e) = sqlx::query(&create_table).execute(&self.pool).await {
            return Err(map_create_error(&e, dataset, schema.name).unwrap_or_else(|| e.into()));
        }

        info!("Table {}.{} created", dataset, schema.name);

        Ok(())
    }

    #[instrument(skip(self, records), fields(rows = records.len()))]
    async fn insert_rows(
        &self,
        dataset: &str,
        table: &str,
        records: &[Record],
    ) -> Result<Vec<InsertError>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let payload = Value::Array(records.iter().cloned().map(Value::Object).collect());
        let sql = insert_sql(dataset, table)?;

        match sqlx::query(&sql).bind(payload).execute(&self.pool).await {
            Ok(result) => {
                debug!("Inserted {} rows into {}.{}", result.rows_affected(), dataset, table);
                Ok(Vec::new())
            },
            // The statement is atomic: a rejected value fails the whole batch
            Err(sqlx::Error::Database(db_err)) => {
                warn!("Insert into {}.{} rejected: {}", dataset, table, db_err.message());
                Ok(vec![InsertError::request(db_err.message())])
            },
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::daily::HORARIOS;
    use crate::schema::gtfs::SHAPES;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct PgCodeError(&'static str);

    impl fmt::Display for PgCodeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "SQLSTATE {}", self.0)
        }
    }

    impl StdError for PgCodeError {}

    impl DatabaseError for PgCodeError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgCodeError(code)))
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("transporte_publico", &SHAPES).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"transporte_publico\".\"shapes\" (\
             \"shape_id\" TEXT, \"shape_pt_lat\" DOUBLE PRECISION, \
             \"shape_pt_lon\" DOUBLE PRECISION, \"shape_pt_sequence\" BIGINT, \
             \"created_at\" TIMESTAMPTZ, \"periodo_de_carga\" TEXT)"
        );
    }

    #[test]
    fn test_create_table_sql_preserves_mixed_case() {
        let sql = create_table_sql("transporte_publico", &HORARIOS).unwrap();
        assert!(sql.contains("\"tipoDia\" TEXT"));
    }

    #[test]
    fn test_insert_sql() {
        let sql = insert_sql("transporte_publico", "stops").unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"transporte_publico\".\"stops\" SELECT * FROM \
             jsonb_populate_recordset(NULL::\"transporte_publico\".\"stops\", $1)"
        );
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        assert!(insert_sql("transporte_publico", "stops\"; DROP").is_err());
        assert!(quote_ident("a b").is_err());
    }

    #[test]
    fn test_lost_creation_race_maps_to_table_exists() {
        for code in ["23505", "42P06", "42P07"] {
            let mapped = map_create_error(&db_error(code), "transporte_publico", "stops");
            assert!(
                matches!(
                    mapped,
                    Some(IngestError::TableExists { ref dataset, ref table })
                        if dataset == "transporte_publico" && table == "stops"
                ),
                "code {}",
                code
            );
        }
    }

    #[test]
    fn test_other_create_errors_are_not_mapped() {
        assert!(map_create_error(&db_error("42501"), "transporte_publico", "stops").is_none());
        assert!(map_create_error(&sqlx::Error::PoolTimedOut, "transporte_publico", "stops").is_none());
    }

    #[tokio::test]
    async fn test_new_from_lazy_pool() {
        let pool = PgPool::connect_lazy("postgresql://localhost/test").unwrap();
        let store = PgTableStore::new(pool);
        assert_eq!(store.pool().size(), 0);
    }
}
