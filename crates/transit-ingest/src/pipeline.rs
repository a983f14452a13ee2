//! Pipeline dispatch
//!
//! [`PipelineContext`] owns the clients shared by every pipeline and runs one
//! [`Pipeline`] for a load date. The CLI and the trigger server both go
//! through here.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use transit_common::LoadDate;

use crate::config::IngestConfig;
use crate::daily::{DailyRouteCollector, DailyRouteTransformer, RouteSink, TransitApiClient};
use crate::error::{IngestError, Result};
use crate::historical::{FeedOrchestrator, GtfsFeedIngest};
use crate::queue::{MessagePublisher, PubSubPublisher};
use crate::registry::SchemaRegistry;
use crate::schema::{daily, gtfs};
use crate::storage::{ObjectStore, S3Storage};
use crate::summary::PipelineReport;
use crate::warehouse::{PgTableStore, TableStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    /// Download the GTFS zip and stage its flat files
    HistoricalIngest,
    /// Load staged GTFS flat files into the GTFS tables
    HistoricalTransform,
    /// Stage every route document in object storage
    DailyIngest,
    /// Publish every route document to the message queue
    DailyRealtime,
    /// Load staged route documents into the daily tables
    DailyTransform,
}

impl Pipeline {
    pub const ALL: [Pipeline; 5] = [
        Pipeline::HistoricalIngest,
        Pipeline::HistoricalTransform,
        Pipeline::DailyIngest,
        Pipeline::DailyRealtime,
        Pipeline::DailyTransform,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Pipeline::HistoricalIngest => crate::historical::feed::PIPELINE_NAME,
            Pipeline::HistoricalTransform => crate::historical::orchestrator::PIPELINE_NAME,
            Pipeline::DailyIngest => crate::daily::collector::PIPELINE_NAME,
            Pipeline::DailyRealtime => crate::daily::collector::REALTIME_PIPELINE_NAME,
            Pipeline::DailyTransform => crate::daily::transform::PIPELINE_NAME,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pipeline {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        Pipeline::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| IngestError::Config(format!("Unknown pipeline: {}", s)))
    }
}

/// Clients and configuration shared by all pipelines
#[derive(Clone)]
pub struct PipelineContext {
    config: IngestConfig,
    storage: Arc<dyn ObjectStore>,
    tables: Arc<dyn TableStore>,
    publisher: Option<Arc<dyn MessagePublisher>>,
}

impl PipelineContext {
    pub fn new(
        config: IngestConfig,
        storage: Arc<dyn ObjectStore>,
        tables: Arc<dyn TableStore>,
        publisher: Option<Arc<dyn MessagePublisher>>,
    ) -> Self {
        Self {
            config,
            storage,
            tables,
            publisher,
        }
    }

    /// Production clients: S3 storage, Postgres tables and, when a project is
    /// configured, Pub/Sub. The database is only contacted on first use.
    pub fn from_config(config: IngestConfig) -> Result<Self> {
        let storage: Arc<dyn ObjectStore> = Arc::new(S3Storage::new(config.storage.clone()));
        let tables: Arc<dyn TableStore> = Arc::new(PgTableStore::connect_lazy(&config.database)?);

        let publisher: Option<Arc<dyn MessagePublisher>> = if config.pubsub.project_id.is_empty() {
            None
        } else {
            Some(Arc::new(PubSubPublisher::new(
                &config.pubsub,
                config.http_timeout_secs,
            )?))
        };

        Ok(Self::new(config, storage, tables, publisher))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn registry(&self, tables: &'static [crate::schema::TableSchema]) -> SchemaRegistry {
        SchemaRegistry::new(self.tables.clone(), self.config.dataset.clone(), tables)
    }

    fn api_client(&self) -> Result<TransitApiClient> {
        TransitApiClient::new(&self.config.transit_api_base_url, self.config.http_timeout_secs)
    }

    #[instrument(skip(self, pipeline), fields(pipeline = %pipeline))]
    pub async fn run(&self, pipeline: Pipeline, date: LoadDate) -> Result<PipelineReport> {
        info!("Starting {} for {}", pipeline, date);

        let report: PipelineReport = match pipeline {
            Pipeline::HistoricalIngest => GtfsFeedIngest::new(
                &self.config.gtfs_feed_url,
                self.config.http_timeout_secs,
                self.storage.clone(),
            )?
            .run(&date)
            .await?
            .into(),
            Pipeline::HistoricalTransform => FeedOrchestrator::new(
                self.storage.clone(),
                self.registry(gtfs::TABLES),
                self.config.batch_size,
            )
            .run(&date)
            .await
            .into(),
            Pipeline::DailyIngest => {
                DailyRouteCollector::new(self.api_client()?, RouteSink::Storage(self.storage.clone()))
                    .run(&date)
                    .await?
                    .into()
            },
            Pipeline::DailyRealtime => {
                let publisher = self.publisher.clone().ok_or_else(|| {
                    IngestError::Config(
                        "PUBSUB_PROJECT_ID must be set for daily-realtime".to_string(),
                    )
                })?;
                let sink = RouteSink::Queue {
                    publisher,
                    topic: self.config.pubsub.topic.clone(),
                };
                DailyRouteCollector::new(self.api_client()?, sink)
                    .run(&date)
                    .await?
                    .into()
            },
            Pipeline::DailyTransform => DailyRouteTransformer::new(
                self.storage.clone(),
                self.registry(daily::TABLES),
                self.config.batch_size,
            )
            .run(&date)
            .await?
            .into(),
        };

        info!("Finished {}: {}", pipeline, report);

        Ok(report)
    }
}
