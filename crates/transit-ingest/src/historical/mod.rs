//! Historical GTFS pipelines
//!
//! - [`feed::GtfsFeedIngest`] downloads the GTFS zip and stages its flat files
//! - [`orchestrator::FeedOrchestrator`] loads the staged files of a date into
//!   the eleven GTFS tables

pub mod archive;
pub mod feed;
pub mod orchestrator;

pub use feed::GtfsFeedIngest;
pub use orchestrator::FeedOrchestrator;
