//! Feed orchestrator
//!
//! Loads the staged GTFS flat files of one date into their tables. Tables are
//! processed one at a time; a failure in one table is recorded and the run
//! moves on to the next.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use transit_common::LoadDate;

use crate::error::Result;
use crate::flat_file;
use crate::loader::{BatchLoader, LoadResult};
use crate::registry::SchemaRegistry;
use crate::storage::{ObjectStore, StagingArea};
use crate::summary::{RunSummary, TableStatus};

pub const PIPELINE_NAME: &str = "historical-transform";

pub struct FeedOrchestrator {
    storage: Arc<dyn ObjectStore>,
    registry: SchemaRegistry,
    loader: BatchLoader,
}

/// What happened to a table whose schema is in place
enum TableOutcome {
    Missing,
    Loaded(LoadResult),
}

impl FeedOrchestrator {
    pub fn new(storage: Arc<dyn ObjectStore>, registry: SchemaRegistry, batch_size: usize) -> Self {
        let loader = BatchLoader::new(registry.clone(), batch_size);
        Self {
            storage,
            registry,
            loader,
        }
    }

    /// Staged location of `table` for `date`
    pub fn staged_key(date: &LoadDate, table: &str) -> String {
        StagingArea::Historical.key(date, &format!("{}.txt", table))
    }

    #[instrument(skip(self))]
    pub async fn run(&self, date: &LoadDate) -> RunSummary {
        let mut summary = RunSummary::new(PIPELINE_NAME, *date);
        let tables = self.registry.tables();

        info!("Loading {} tables for {}", tables.len(), date);

        for schema in tables {
            let table = schema.name;
            summary.track(table);

            if let Err(e) = self.registry.ensure_table(table).await {
                error!("✗ {}: could not ensure table: {}", table, e);
                summary.set_status(table, TableStatus::failed(e));
                continue;
            }
            summary.set_status(table, TableStatus::SchemaEnsured);

            match self.load_table(date, table).await {
                Ok(TableOutcome::Missing) => {
                    warn!("No staged file for {} on {}, skipping", table, date);
                    summary.set_status(table, TableStatus::Skipped);
                },
                Ok(TableOutcome::Loaded(result)) => {
                    info!(
                        "✓ {}: {} rows loaded in {} batches",
                        table,
                        result.rows_loaded(),
                        result.batch_count()
                    );
                    summary.add_load(&result);
                },
                Err(e) => {
                    error!("✗ {}: {}", table, e);
                    summary.set_status(table, TableStatus::failed(e));
                },
            }
        }

        info!("{}", summary.status_line());

        summary
    }

    async fn load_table(&self, date: &LoadDate, table: &str) -> Result<TableOutcome> {
        let key = Self::staged_key(date, table);

        if !self.storage.exists(&key).await? {
            return Ok(TableOutcome::Missing);
        }

        let content = self.storage.read_text(&key).await?;
        let rows = flat_file::parse(&content)?;
        info!("Parsed {} rows from {}", rows.len(), key);

        let result = self.loader.load(table, &rows, date).await?;
        Ok(TableOutcome::Loaded(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::gtfs;
    use crate::storage::MemoryStorage;
    use crate::warehouse::MemoryTableStore;

    const DATASET: &str = "transporte_publico";

    fn setup() -> (Arc<MemoryStorage>, Arc<MemoryTableStore>, FeedOrchestrator) {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(MemoryTableStore::new());
        let registry = SchemaRegistry::new(store.clone(), DATASET, gtfs::TABLES);
        let orchestrator = FeedOrchestrator::new(storage.clone(), registry, 500);
        (storage, store, orchestrator)
    }

    fn date() -> LoadDate {
        "2024-06-01".parse().unwrap()
    }

    #[test]
    fn test_staged_key() {
        assert_eq!(
            FeedOrchestrator::staged_key(&date(), "stop_times"),
            "datos_historicos/2024-06-01/stop_times.txt"
        );
    }

    #[tokio::test]
    async fn test_nothing_staged_skips_every_table() {
        let (_, store, orchestrator) = setup();

        let summary = orchestrator.run(&date()).await;

        assert_eq!(summary.skipped(), 11);
        assert_eq!(store.create_calls().unwrap().len(), 11);
        assert!(store.insert_calls().unwrap().is_empty());
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_header_only_file_loads_nothing() {
        let (storage, store, orchestrator) = setup();
        storage
            .insert_text("datos_historicos/2024-06-01/agency.txt", "agency_id,agency_name\n")
            .unwrap();

        let summary = orchestrator.run(&date()).await;

        assert_eq!(
            summary.status("agency"),
            Some(&TableStatus::Loaded {
                batches: 0,
                rows_loaded: 0,
                rows_rejected: 0
            })
        );
        assert!(store.insert_calls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_only_its_table() {
        let (storage, _, orchestrator) = setup();
        storage
            .insert_bytes("datos_historicos/2024-06-01/calendar.txt", vec![0xff, 0xfe], "text/plain")
            .unwrap();
        storage
            .insert_text("datos_historicos/2024-06-01/stops.txt", "stop_id\nPA1\n")
            .unwrap();

        let summary = orchestrator.run(&date()).await;

        assert!(matches!(summary.status("calendar"), Some(TableStatus::Failed { .. })));
        assert!(matches!(summary.status("stops"), Some(TableStatus::Loaded { rows_loaded: 1, .. })));
        assert_eq!(summary.failed(), 1);
    }
}
