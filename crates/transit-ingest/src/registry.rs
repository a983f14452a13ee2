//! Schema registry
//!
//! Resolves table names to their declared schema and makes sure the table
//! exists in the store before anything is loaded into it.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{IngestError, Result};
use crate::schema::{find_table, TableSchema};
use crate::warehouse::TableStore;

#[derive(Clone)]
pub struct SchemaRegistry {
    store: Arc<dyn TableStore>,
    dataset: String,
    tables: &'static [TableSchema],
}

impl SchemaRegistry {
    pub fn new(
        store: Arc<dyn TableStore>,
        dataset: impl Into<String>,
        tables: &'static [TableSchema],
    ) -> Self {
        Self {
            store,
            dataset: dataset.into(),
            tables,
        }
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn tables(&self) -> &'static [TableSchema] {
        self.tables
    }

    pub fn schema(&self, table: &str) -> Result<&'static TableSchema> {
        find_table(self.tables, table).ok_or_else(|| IngestError::UnknownTable(table.to_string()))
    }

    /// Create `table` from its declared schema unless it already exists.
    ///
    /// An "already exists" answer from the store, including one caused by a
    /// concurrent run creating the table first, counts as success.
    #[instrument(skip(self), fields(dataset = %self.dataset))]
    pub async fn ensure_table(&self, table: &str) -> Result<()> {
        let schema = self.schema(table)?;

        if self.store.table_exists(&self.dataset, table).await? {
            debug!("Table {}.{} already exists", self.dataset, table);
            return Ok(());
        }

        match self.store.create_table(&self.dataset, schema).await {
            Ok(()) => {
                info!("Created table {}.{}", self.dataset, table);
                Ok(())
            },
            Err(IngestError::TableExists { .. }) => {
                info!("Table {}.{} was created concurrently", self.dataset, table);
                Ok(())
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::gtfs;
    use crate::warehouse::MemoryTableStore;

    fn registry(store: Arc<MemoryTableStore>) -> SchemaRegistry {
        SchemaRegistry::new(store, "transporte_publico", gtfs::TABLES)
    }

    #[tokio::test]
    async fn test_ensure_table_creates_once() {
        let store = Arc::new(MemoryTableStore::new());
        let registry = registry(store.clone());

        registry.ensure_table("stops").await.unwrap();
        registry.ensure_table("stops").await.unwrap();

        assert_eq!(
            store.create_calls().unwrap(),
            vec![("transporte_publico".to_string(), "stops".to_string())]
        );
    }

    #[tokio::test]
    async fn test_ensure_table_tolerates_creation_race() {
        let store = Arc::new(MemoryTableStore::new());
        store.simulate_creation_race("trips").unwrap();

        registry(store.clone()).ensure_table("trips").await.unwrap();
        assert!(store.table_exists("transporte_publico", "trips").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_unknown_table() {
        let store = Arc::new(MemoryTableStore::new());

        let err = registry(store.clone()).ensure_table("fare_rules").await.unwrap_err();
        assert!(matches!(err, IngestError::UnknownTable(name) if name == "fare_rules"));
        assert!(store.create_calls().unwrap().is_empty());
    }
}
