//! Batch loader
//!
//! Stamps rows with the ingestion timestamp and load-period label, types them
//! against the table schema and appends them to the table store in fixed-size
//! batches. Every batch is attempted; failures are collected in the
//! [`LoadResult`] instead of aborting the load.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use transit_common::LoadDate;

use crate::error::Result;
use crate::flat_file::Row;
use crate::registry::SchemaRegistry;
use crate::schema::gtfs::{CREATED_AT, LOAD_PERIOD};
use crate::schema::{Record, TableSchema};
use crate::warehouse::{InsertError, TableStore};

/// Result of one batch submission
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Loaded { rows: usize },
    Rejected { rows: usize, errors: Vec<InsertError> },
}

impl BatchOutcome {
    pub fn rows(&self) -> usize {
        match self {
            BatchOutcome::Loaded { rows } | BatchOutcome::Rejected { rows, .. } => *rows,
        }
    }

    /// Rows of this batch that did not land
    pub fn rows_rejected(&self) -> usize {
        match self {
            BatchOutcome::Loaded { .. } => 0,
            BatchOutcome::Rejected { rows, errors } => {
                if errors.iter().any(|e| e.index.is_none()) {
                    return *rows;
                }
                let indexes: BTreeSet<_> = errors.iter().filter_map(|e| e.index).collect();
                indexes.len().min(*rows)
            },
        }
    }
}

/// Per-table outcome of a load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadResult {
    pub table: String,
    pub batches: Vec<BatchOutcome>,
}

impl LoadResult {
    pub fn empty(table: &str) -> Self {
        Self {
            table: table.to_string(),
            batches: Vec::new(),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn rows_attempted(&self) -> usize {
        self.batches.iter().map(BatchOutcome::rows).sum()
    }

    pub fn rows_rejected(&self) -> usize {
        self.batches.iter().map(BatchOutcome::rows_rejected).sum()
    }

    pub fn rows_loaded(&self) -> usize {
        self.rows_attempted() - self.rows_rejected()
    }

    pub fn is_clean(&self) -> bool {
        self.batches
            .iter()
            .all(|b| matches!(b, BatchOutcome::Loaded { .. }))
    }

    pub fn errors(&self) -> impl Iterator<Item = &InsertError> {
        self.batches.iter().flat_map(|b| match b {
            BatchOutcome::Loaded { .. } => &[][..],
            BatchOutcome::Rejected { errors, .. } => errors.as_slice(),
        })
    }
}

/// Turn parsed rows into records carrying the two enrichment fields
pub fn enrich(rows: &[Row], created_at: DateTime<Utc>, period: &LoadDate) -> Vec<Record> {
    let created_at = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    let period = period.label();

    rows.iter()
        .map(|row| {
            let mut record: Record = row
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            record.insert(CREATED_AT.to_string(), Value::String(created_at.clone()));
            record.insert(LOAD_PERIOD.to_string(), Value::String(period.clone()));
            record
        })
        .collect()
}

#[derive(Clone)]
pub struct BatchLoader {
    registry: SchemaRegistry,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(registry: SchemaRegistry, batch_size: usize) -> Self {
        Self {
            registry,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Enrich `rows` for `period` and load them into `table`
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn load(&self, table: &str, rows: &[Row], period: &LoadDate) -> Result<LoadResult> {
        if rows.is_empty() {
            debug!("No rows for {}, nothing to load", table);
            return Ok(LoadResult::empty(table));
        }

        let records = enrich(rows, Utc::now(), period);
        self.load_records(table, &records).await
    }

    /// Load already-shaped records into `table` without enrichment
    #[instrument(skip(self, records), fields(rows = records.len()))]
    pub async fn load_records(&self, table: &str, records: &[Record]) -> Result<LoadResult> {
        let schema = self.registry.schema(table)?;
        let mut result = LoadResult::empty(table);

        if records.is_empty() {
            return Ok(result);
        }

        let total_batches = records.len().div_ceil(self.batch_size);

        for (batch_idx, batch) in records.chunks(self.batch_size).enumerate() {
            debug!(
                "Loading {} batch {} / {} ({} rows)",
                table,
                batch_idx + 1,
                total_batches,
                batch.len()
            );

            let outcome = self.submit(schema, batch).await;

            if let BatchOutcome::Rejected { errors, .. } = &outcome {
                warn!(
                    "{} batch {} / {}: {} errors, first: {}",
                    table,
                    batch_idx + 1,
                    total_batches,
                    errors.len(),
                    errors.first().map(ToString::to_string).unwrap_or_default()
                );
            }

            result.batches.push(outcome);
        }

        info!(
            "Loaded {} rows into {}.{} in {} batches ({} rejected)",
            result.rows_loaded(),
            self.registry.dataset(),
            table,
            result.batch_count(),
            result.rows_rejected()
        );

        Ok(result)
    }

    async fn submit(&self, schema: &TableSchema, batch: &[Record]) -> BatchOutcome {
        let mut errors = Vec::new();
        let mut typed = Vec::with_capacity(batch.len());
        // Position in `batch` of each entry of `typed`
        let mut positions = Vec::with_capacity(batch.len());

        for (index, record) in batch.iter().enumerate() {
            match schema.coerce_record(record) {
                Ok(record) => {
                    typed.push(record);
                    positions.push(index);
                },
                Err(message) => errors.push(InsertError::row(index, message)),
            }
        }

        if !typed.is_empty() {
            let store: &Arc<dyn TableStore> = self.registry.store();
            match store
                .insert_rows(self.registry.dataset(), schema.name, &typed)
                .await
            {
                Ok(insert_errors) => errors.extend(insert_errors.into_iter().map(|e| InsertError {
                    index: e.index.and_then(|i| positions.get(i).copied()),
                    message: e.message,
                })),
                Err(e) => {
                    error!("Insert into {} failed: {}", schema.name, e);
                    errors.push(InsertError::request(e.to_string()));
                },
            }
        }

        if errors.is_empty() {
            BatchOutcome::Loaded { rows: batch.len() }
        } else {
            BatchOutcome::Rejected {
                rows: batch.len(),
                errors,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::gtfs;
    use crate::warehouse::MemoryTableStore;
    use chrono::TimeZone;

    const DATASET: &str = "transporte_publico";

    async fn setup(batch_size: usize) -> (Arc<MemoryTableStore>, BatchLoader) {
        let store = Arc::new(MemoryTableStore::new());
        let registry = SchemaRegistry::new(store.clone(), DATASET, gtfs::TABLES);
        registry.ensure_table("stops").await.unwrap();
        (store, BatchLoader::new(registry, batch_size))
    }

    fn stop_rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("stop_id".to_string(), format!("PA{}", i));
                row.insert("stop_lat".to_string(), "-33.45".to_string());
                row
            })
            .collect()
    }

    fn date() -> LoadDate {
        "2024-06-01".parse().unwrap()
    }

    #[test]
    fn test_enrich_adds_both_fields() {
        let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let records = enrich(&stop_rows(2), created_at, &date());

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record[LOAD_PERIOD], "2024-06-01");
            assert_eq!(record[CREATED_AT], "2024-06-01T12:00:00.000000Z");
            assert_eq!(record["stop_lat"], "-33.45");
        }
    }

    #[tokio::test]
    async fn test_load_empty_is_noop() {
        let (store, loader) = setup(500).await;

        let result = loader.load("stops", &[], &date()).await.unwrap();

        assert_eq!(result.batch_count(), 0);
        assert!(store.insert_calls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_partitions_into_batches() {
        let (store, loader) = setup(500).await;

        let result = loader.load("stops", &stop_rows(1001), &date()).await.unwrap();

        let sizes: Vec<usize> = store
            .insert_calls()
            .unwrap()
            .iter()
            .map(|c| c.records.len())
            .collect();
        assert_eq!(sizes, vec![500, 500, 1]);
        assert_eq!(result.batch_count(), 3);
        assert_eq!(result.rows_loaded(), 1001);
        assert!(result.is_clean());
    }

    #[tokio::test]
    async fn test_load_types_values() {
        let (store, loader) = setup(500).await;

        loader.load("stops", &stop_rows(1), &date()).await.unwrap();

        let rows = store.rows(DATASET, "stops").unwrap();
        assert_eq!(rows[0]["stop_lat"], serde_json::json!(-33.45));
        assert_eq!(rows[0]["periodo_de_carga"], "2024-06-01");
    }

    #[tokio::test]
    async fn test_bad_row_rejected_others_loaded() {
        let (store, loader) = setup(2).await;

        let mut rows = stop_rows(3);
        rows[1].insert("stop_lat".to_string(), "north".to_string());

        let result = loader.load("stops", &rows, &date()).await.unwrap();

        assert_eq!(result.batch_count(), 2);
        assert_eq!(result.rows_rejected(), 1);
        assert_eq!(result.rows_loaded(), 2);
        assert_eq!(result.errors().next().and_then(|e| e.index), Some(1));
        assert_eq!(store.rows(DATASET, "stops").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let (store, loader) = setup(2).await;
        store.fail_inserts("stops").unwrap();

        let result = loader.load("stops", &stop_rows(5), &date()).await.unwrap();

        assert_eq!(result.batch_count(), 3);
        assert_eq!(store.insert_calls().unwrap().len(), 3);
        assert_eq!(result.rows_rejected(), 5);
        assert!(!result.is_clean());
    }

    #[tokio::test]
    async fn test_load_unknown_table() {
        let (_, loader) = setup(500).await;
        assert!(loader.load("fares", &stop_rows(1), &date()).await.is_err());
    }
}
