//! Transit Ingest Library
//!
//! Fetch, stage and load public-transit data.
//!
//! # Pipelines
//!
//! | Pipeline               | Source              | Destination                      |
//! |------------------------|---------------------|----------------------------------|
//! | `historical-ingest`    | GTFS zip            | `datos_historicos/{date}/*.txt`  |
//! | `historical-transform` | staged GTFS files   | eleven GTFS tables               |
//! | `daily-ingest`         | transit REST API    | `datos_diarios/{date}/*.json`    |
//! | `daily-realtime`       | transit REST API    | message-queue topic              |
//! | `daily-transform`      | staged route JSON   | five daily tables                |
//!
//! Every collaborator sits behind a trait ([`storage::ObjectStore`],
//! [`warehouse::TableStore`], [`queue::MessagePublisher`]) with a production
//! implementation and an in-memory one.
//!
//! # Example
//!
//! ```no_run
//! use transit_ingest::{IngestConfig, Pipeline, PipelineContext};
//! use transit_common::LoadDate;
//!
//! # async fn example() -> transit_ingest::Result<()> {
//! let context = PipelineContext::from_config(IngestConfig::load()?)?;
//! let report = context.run(Pipeline::HistoricalTransform, LoadDate::today()).await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod daily;
pub mod error;
pub mod flat_file;
pub mod historical;
pub mod http;
pub mod loader;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod summary;
pub mod warehouse;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use pipeline::{Pipeline, PipelineContext};
pub use summary::{IngestSummary, PipelineReport, RunSummary, TableStatus};
