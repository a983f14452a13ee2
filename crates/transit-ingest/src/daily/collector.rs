//! Daily route collection
//!
//! Fetches the current service list and the detail document of every route,
//! then hands each document to a [`RouteSink`]: the object store for the
//! batch transform, or a message-queue topic for realtime consumers.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use transit_common::LoadDate;

use super::client::TransitApiClient;
use crate::error::{IngestError, Result};
use crate::queue::MessagePublisher;
use crate::storage::{ObjectStore, StagingArea};
use crate::summary::IngestSummary;

pub const PIPELINE_NAME: &str = "daily-ingest";
pub const REALTIME_PIPELINE_NAME: &str = "daily-realtime";

/// Destination of collected route documents
#[derive(Clone)]
pub enum RouteSink {
    /// `datos_diarios/{date}/{code}.json`
    Storage(Arc<dyn ObjectStore>),
    Queue {
        publisher: Arc<dyn MessagePublisher>,
        topic: String,
    },
}

impl RouteSink {
    fn pipeline_name(&self) -> &'static str {
        match self {
            RouteSink::Storage(_) => PIPELINE_NAME,
            RouteSink::Queue { .. } => REALTIME_PIPELINE_NAME,
        }
    }

    async fn deliver(&self, date: &LoadDate, code: &str, document: Vec<u8>) -> Result<()> {
        match self {
            RouteSink::Storage(storage) => {
                let key = StagingArea::Daily.key(date, &format!("{}.json", code));
                storage.write(&key, document, "application/json").await
            },
            RouteSink::Queue { publisher, topic } => {
                let id = publisher.publish(topic, &document).await?;
                info!("Published route {} to {} as message {}", code, topic, id);
                Ok(())
            },
        }
    }
}

pub struct DailyRouteCollector {
    api: TransitApiClient,
    sink: RouteSink,
}

impl DailyRouteCollector {
    pub fn new(api: TransitApiClient, sink: RouteSink) -> Self {
        Self { api, sink }
    }

    #[instrument(skip(self), fields(pipeline = self.sink.pipeline_name()))]
    pub async fn run(&self, date: &LoadDate) -> Result<IngestSummary> {
        let codes = self.api.service_codes().await?;
        if codes.is_empty() {
            return Err(IngestError::upstream(
                format!("{}/getservicios/all", self.api.base_url()),
                "service list is empty",
            ));
        }

        info!("Collecting {} routes for {}", codes.len(), date);

        let mut summary = IngestSummary::new(self.sink.pipeline_name(), *date);

        for code in codes {
            let detail = match self.api.route_detail(&code).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!("No detail for route {}: {}", code, e);
                    summary.record_failure(code, e);
                    continue;
                },
            };

            let document = match serde_json::to_vec(&detail) {
                Ok(bytes) => bytes,
                Err(e) => {
                    summary.record_failure(code, e);
                    continue;
                },
            };

            match self.sink.deliver(date, &code, document).await {
                Ok(()) => summary.record_written(code),
                Err(e) => {
                    error!("Failed to deliver route {}: {}", code, e);
                    summary.record_failure(code, e);
                },
            }
        }

        info!("{}", summary.status_line());

        Ok(summary)
    }
}
