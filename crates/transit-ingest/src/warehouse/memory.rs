//! In-memory table store
//!
//! Records every create and insert call so tests can assert on exactly what a
//! pipeline asked the store to do.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::{InsertError, TableStore};
use crate::error::{IngestError, Result};
use crate::schema::{Record, TableSchema};

/// One `insert_rows` call as the store received it
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCall {
    pub dataset: String,
    pub table: String,
    pub records: Vec<Record>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<(String, String), TableSchema>,
    rows: BTreeMap<(String, String), Vec<Record>>,
    create_calls: Vec<(String, String)>,
    insert_calls: Vec<InsertCall>,
    /// Tables whose creation reports "already exists" without creating
    creation_races: BTreeSet<String>,
    /// Tables whose inserts fail at the request level
    failing_inserts: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryTableStore {
    state: Mutex<State>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| IngestError::Warehouse("memory store lock poisoned".to_string()))
    }

    /// Make the next creation of `table` behave as if another run created it first
    pub fn simulate_creation_race(&self, table: &str) -> Result<()> {
        self.state()?.creation_races.insert(table.to_string());
        Ok(())
    }

    /// Make every insert into `table` fail
    pub fn fail_inserts(&self, table: &str) -> Result<()> {
        self.state()?.failing_inserts.insert(table.to_string());
        Ok(())
    }

    pub fn create_calls(&self) -> Result<Vec<(String, String)>> {
        Ok(self.state()?.create_calls.clone())
    }

    pub fn insert_calls(&self) -> Result<Vec<InsertCall>> {
        Ok(self.state()?.insert_calls.clone())
    }

    /// Rows accepted into `dataset.table`
    pub fn rows(&self, dataset: &str, table: &str) -> Result<Vec<Record>> {
        Ok(self
            .state()?
            .rows
            .get(&(dataset.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool> {
        Ok(self
            .state()?
            .tables
            .contains_key(&(dataset.to_string(), table.to_string())))
    }

    async fn create_table(&self, dataset: &str, schema: &TableSchema) -> Result<()> {
        let mut state = self.state()?;
        let key = (dataset.to_string(), schema.name.to_string());
        state.create_calls.push(key.clone());

        if state.creation_races.remove(schema.name) {
            state.tables.insert(key, *schema);
            return Err(IngestError::TableExists {
                dataset: dataset.to_string(),
                table: schema.name.to_string(),
            });
        }

        if state.tables.contains_key(&key) {
            return Err(IngestError::TableExists {
                dataset: dataset.to_string(),
                table: schema.name.to_string(),
            });
        }

        state.tables.insert(key, *schema);
        Ok(())
    }

    async fn insert_rows(
        &self,
        dataset: &str,
        table: &str,
        records: &[Record],
    ) -> Result<Vec<InsertError>> {
        let mut state = self.state()?;
        let key = (dataset.to_string(), table.to_string());

        state.insert_calls.push(InsertCall {
            dataset: dataset.to_string(),
            table: table.to_string(),
            records: records.to_vec(),
        });

        if state.failing_inserts.contains(table) {
            return Ok(vec![InsertError::request(format!("insert into {} refused", table))]);
        }

        let schema = *state
            .tables
            .get(&key)
            .ok_or_else(|| IngestError::Warehouse(format!("Table {}.{} not found", dataset, table)))?;

        // Accepted rows land, rejected ones are reported
        let mut errors = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match schema.coerce_record(record) {
                Ok(typed) => state.rows.entry(key.clone()).or_default().push(typed),
                Err(message) => errors.push(InsertError::row(index, message)),
            }
        }

        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::gtfs::AGENCY;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_create_then_exists() {
        let store = MemoryTableStore::new();
        assert!(!store.table_exists("ds", "agency").await.unwrap());

        store.create_table("ds", &AGENCY).await.unwrap();
        assert!(store.table_exists("ds", "agency").await.unwrap());

        assert!(matches!(
            store.create_table("ds", &AGENCY).await,
            Err(IngestError::TableExists { .. })
        ));
        assert_eq!(store.create_calls().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_creation_race_reports_exists() {
        let store = MemoryTableStore::new();
        store.simulate_creation_race("agency").unwrap();

        assert!(matches!(
            store.create_table("ds", &AGENCY).await,
            Err(IngestError::TableExists { .. })
        ));
        assert!(store.table_exists("ds", "agency").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_reports_rejected_rows() {
        let store = MemoryTableStore::new();
        store.create_table("ds", &AGENCY).await.unwrap();

        let errors = store
            .insert_rows(
                "ds",
                "agency",
                &[
                    record(&[("agency_id", json!("DTPM"))]),
                    record(&[("unknown", json!("x"))]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, Some(1));
        assert_eq!(store.rows("ds", "agency").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_is_error() {
        let store = MemoryTableStore::new();
        assert!(store.insert_rows("ds", "agency", &[Record::new()]).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_inserts() {
        let store = MemoryTableStore::new();
        store.create_table("ds", &AGENCY).await.unwrap();
        store.fail_inserts("agency").unwrap();

        let errors = store.insert_rows("ds", "agency", &[Record::new()]).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, None);
        assert!(store.rows("ds", "agency").unwrap().is_empty());
    }
}
