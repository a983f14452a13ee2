//! Shared helpers for pipeline integration tests

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;

use transit_common::LoadDate;
use transit_ingest::queue::{MemoryPublisher, MessagePublisher};
use transit_ingest::storage::MemoryStorage;
use transit_ingest::warehouse::MemoryTableStore;
use transit_ingest::{IngestConfig, PipelineContext};

pub const DATASET: &str = "transporte_publico";

pub fn load_date() -> LoadDate {
    "2024-06-01".parse().unwrap()
}

/// In-memory collaborators plus a context wired to them
pub struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub tables: Arc<MemoryTableStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub context: PipelineContext,
}

impl Harness {
    pub fn new(config: IngestConfig) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let tables = Arc::new(MemoryTableStore::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let context = PipelineContext::new(
            config,
            storage.clone(),
            tables.clone(),
            Some(publisher.clone() as Arc<dyn MessagePublisher>),
        );

        Self {
            storage,
            tables,
            publisher,
            context,
        }
    }

    pub fn with_upstream(base_url: &str) -> Self {
        Self::new(
            IngestConfig::builder()
                .dataset(DATASET)
                .transit_api_base_url(base_url)
                .gtfs_feed_url(format!("{}/gtfs.zip", base_url))
                .http_timeout_secs(5)
                .build(),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(IngestConfig::builder().dataset(DATASET).build())
    }
}

/// Zip archive built in memory from (path, contents) pairs
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents) in entries {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
