//! Error taxonomy for the ingestion pipelines
//!
//! Each variant maps to one failure kind so callers (CLI, trigger server) can
//! branch on it instead of inspecting strings.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// An upstream source (transit API, GTFS feed) could not be fetched
    #[error("Upstream fetch failed for {url}: {message}")]
    UpstreamFetch { url: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Table store error: {0}")]
    Warehouse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The table store reported that the table is already there
    #[error("Table {dataset}.{table} already exists")]
    TableExists { dataset: String, table: String },

    #[error("No schema declared for table '{0}'")]
    UnknownTable(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] transit_common::TransitError),
}

impl IngestError {
    pub fn upstream(url: impl Into<String>, message: impl ToString) -> Self {
        IngestError::UpstreamFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// True when the failure originated outside this system
    pub fn is_upstream(&self) -> bool {
        matches!(self, IngestError::UpstreamFetch { .. } | IngestError::Http(_))
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}
