//! Durable table store
//!
//! A *dataset* groups tables (a Postgres schema in [`PgTableStore`]). Inserts
//! are append-only and report row-level failures as values so one bad batch
//! never aborts a run.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::schema::{Record, TableSchema};

pub mod memory;
pub mod postgres;

pub use memory::MemoryTableStore;
pub use postgres::PgTableStore;

/// A rejected row, or the whole request when `index` is `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertError {
    pub index: Option<usize>,
    pub message: String,
}

impl InsertError {
    pub fn row(index: usize, message: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            message: message.into(),
        }
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self {
            index: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "row {}: {}", index, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool>;

    /// Create `schema.name` in `dataset`.
    ///
    /// Stores without atomic create-if-absent return
    /// [`IngestError::TableExists`](crate::error::IngestError::TableExists)
    /// when the table is already there.
    async fn create_table(&self, dataset: &str, schema: &TableSchema) -> Result<()>;

    /// Append `records`; an empty vector means every row was accepted
    async fn insert_rows(
        &self,
        dataset: &str,
        table: &str,
        records: &[Record],
    ) -> Result<Vec<InsertError>>;
}
