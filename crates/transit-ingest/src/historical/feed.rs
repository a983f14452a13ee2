//! GTFS feed ingest
//!
//! Downloads the published GTFS zip and stages each flat file under
//! `datos_historicos/{date}/` for the feed orchestrator.

use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info, instrument};
use transit_common::LoadDate;

use super::archive::extract_flat_files;
use crate::error::{IngestError, Result};
use crate::http;
use crate::storage::{ObjectStore, StagingArea};
use crate::summary::IngestSummary;

pub const PIPELINE_NAME: &str = "historical-ingest";

const CONTENT_TYPE: &str = "text/plain";

pub struct GtfsFeedIngest {
    client: Client,
    feed_url: String,
    storage: Arc<dyn ObjectStore>,
}

impl GtfsFeedIngest {
    pub fn new(
        feed_url: impl Into<String>,
        timeout_secs: u64,
        storage: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout_secs)?,
            feed_url: feed_url.into(),
            storage,
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    #[instrument(skip(self), fields(url = %self.feed_url))]
    pub async fn run(&self, date: &LoadDate) -> Result<IngestSummary> {
        info!("Downloading GTFS feed");

        let data = http::get_bytes(&self.client, &self.feed_url).await?;
        info!("Downloaded GTFS feed: {} bytes ({} KB)", data.len(), data.len() / 1024);

        let files = extract_flat_files(&data)
            .map_err(|e| IngestError::upstream(&self.feed_url, format!("unreadable archive: {}", e)))?;

        let mut summary = IngestSummary::new(PIPELINE_NAME, *date);

        for file in files {
            let key = StagingArea::Historical.key(date, &file.name);

            match self.storage.write(&key, file.contents, CONTENT_TYPE).await {
                Ok(()) => summary.record_written(file.name),
                Err(e) => {
                    error!("Failed to stage {}: {}", key, e);
                    summary.record_failure(file.name, e);
                },
            }
        }

        info!("{}", summary.status_line());

        Ok(summary)
    }
}
