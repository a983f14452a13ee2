//! Run summaries
//!
//! Pipelines report what happened per table (transform pipelines) or per
//! staged item (ingest pipelines). The CLI and the trigger server render these
//! as a status line and map them to an exit code or HTTP status.

use serde::Serialize;
use std::fmt;
use transit_common::LoadDate;

use crate::loader::LoadResult;

/// Lifecycle of one table within a transform run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Pending,
    SchemaEnsured,
    /// No staged input for this table and date
    Skipped,
    Loaded {
        batches: usize,
        rows_loaded: usize,
        rows_rejected: usize,
    },
    Failed {
        error: String,
    },
}

impl TableStatus {
    pub fn from_load(result: &LoadResult) -> Self {
        TableStatus::Loaded {
            batches: result.batch_count(),
            rows_loaded: result.rows_loaded(),
            rows_rejected: result.rows_rejected(),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        TableStatus::Failed {
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

/// An input item (staged file, route code) that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: impl ToString) -> Self {
        Self {
            item: item.into(),
            error: error.to_string(),
        }
    }
}

/// Outcome of a transform/load run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub date: LoadDate,
    pub tables: Vec<TableReport>,
    pub failed_items: Vec<ItemFailure>,
}

impl RunSummary {
    pub fn new(pipeline: &str, date: LoadDate) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            date,
            tables: Vec::new(),
            failed_items: Vec::new(),
        }
    }

    /// Register `table` as pending; a later `set_status` moves it on
    pub fn track(&mut self, table: &str) {
        self.set_status(table, TableStatus::Pending);
    }

    pub fn set_status(&mut self, table: &str, status: TableStatus) {
        match self.tables.iter_mut().find(|r| r.table == table) {
            Some(report) => report.status = status,
            None => self.tables.push(TableReport {
                table: table.to_string(),
                status,
            }),
        }
    }

    pub fn status(&self, table: &str) -> Option<&TableStatus> {
        self.tables.iter().find(|r| r.table == table).map(|r| &r.status)
    }

    /// Fold another load of `table` into its `Loaded` counters
    pub fn add_load(&mut self, result: &LoadResult) {
        let next = match self.status(&result.table) {
            Some(TableStatus::Loaded {
                batches,
                rows_loaded,
                rows_rejected,
            }) => TableStatus::Loaded {
                batches: batches + result.batch_count(),
                rows_loaded: rows_loaded + result.rows_loaded(),
                rows_rejected: rows_rejected + result.rows_rejected(),
            },
            _ => TableStatus::from_load(result),
        };
        self.set_status(&result.table, next);
    }

    pub fn record_item_failure(&mut self, item: impl Into<String>, error: impl ToString) {
        self.failed_items.push(ItemFailure::new(item, error));
    }

    fn count(&self, pred: impl Fn(&TableStatus) -> bool) -> usize {
        self.tables.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn loaded(&self) -> usize {
        self.count(|s| matches!(s, TableStatus::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, TableStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TableStatus::Failed { .. }))
    }

    pub fn rows_loaded(&self) -> usize {
        self.tables
            .iter()
            .map(|r| match r.status {
                TableStatus::Loaded { rows_loaded, .. } => rows_loaded,
                _ => 0,
            })
            .sum()
    }

    pub fn rows_rejected(&self) -> usize {
        self.tables
            .iter()
            .map(|r| match r.status {
                TableStatus::Loaded { rows_rejected, .. } => rows_rejected,
                _ => 0,
            })
            .sum()
    }

    /// Every table loaded or skipped, no rejected rows, no failed items
    pub fn is_complete(&self) -> bool {
        self.failed() == 0 && self.rows_rejected() == 0 && self.failed_items.is_empty()
    }

    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{} {}: {} tables loaded ({} rows), {} skipped, {} failed",
            self.pipeline,
            self.date,
            self.loaded(),
            self.rows_loaded(),
            self.skipped(),
            self.failed()
        );
        if self.rows_rejected() > 0 {
            line.push_str(&format!(", {} rows rejected", self.rows_rejected()));
        }
        if !self.failed_items.is_empty() {
            line.push_str(&format!(", {} inputs unreadable", self.failed_items.len()));
        }
        line
    }
}

/// Outcome of an ingest run that stages data for later transforms
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub pipeline: String,
    pub date: LoadDate,
    pub written: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl IngestSummary {
    pub fn new(pipeline: &str, date: LoadDate) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            date,
            written: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_written(&mut self, item: impl Into<String>) {
        self.written.push(item.into());
    }

    pub fn record_failure(&mut self, item: impl Into<String>, error: impl ToString) {
        self.failed.push(ItemFailure::new(item, error));
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} {}: {} written, {} failed",
            self.pipeline,
            self.date,
            self.written.len(),
            self.failed.len()
        )
    }
}

/// Either kind of summary, as returned by the pipeline dispatcher
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PipelineReport {
    Run(RunSummary),
    Ingest(IngestSummary),
}

impl PipelineReport {
    pub fn is_complete(&self) -> bool {
        match self {
            PipelineReport::Run(s) => s.is_complete(),
            PipelineReport::Ingest(s) => s.is_complete(),
        }
    }

    pub fn status_line(&self) -> String {
        match self {
            PipelineReport::Run(s) => s.status_line(),
            PipelineReport::Ingest(s) => s.status_line(),
        }
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}

impl From<RunSummary> for PipelineReport {
    fn from(summary: RunSummary) -> Self {
        PipelineReport::Run(summary)
    }
}

impl From<IngestSummary> for PipelineReport {
    fn from(summary: IngestSummary) -> Self {
        PipelineReport::Ingest(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::BatchOutcome;
    use crate::warehouse::InsertError;

    fn date() -> LoadDate {
        "2024-06-01".parse().unwrap()
    }

    fn load(table: &str, rows: usize, rejected: bool) -> LoadResult {
        let outcome = if rejected {
            BatchOutcome::Rejected {
                rows,
                errors: vec![InsertError::request("boom")],
            }
        } else {
            BatchOutcome::Loaded { rows }
        };
        LoadResult {
            table: table.to_string(),
            batches: vec![outcome],
        }
    }

    #[test]
    fn test_table_lifecycle() {
        let mut summary = RunSummary::new("historical-transform", date());
        summary.track("stops");
        assert_eq!(summary.status("stops"), Some(&TableStatus::Pending));

        summary.set_status("stops", TableStatus::SchemaEnsured);
        summary.add_load(&load("stops", 2, false));

        assert_eq!(
            summary.status("stops"),
            Some(&TableStatus::Loaded {
                batches: 1,
                rows_loaded: 2,
                rows_rejected: 0
            })
        );
        assert_eq!(summary.tables.len(), 1);
    }

    #[test]
    fn test_counts_and_status_line() {
        let mut summary = RunSummary::new("historical-transform", date());
        summary.add_load(&load("stops", 2, false));
        summary.set_status("routes", TableStatus::Skipped);
        summary.set_status("trips", TableStatus::failed("no permission"));

        assert_eq!(summary.loaded(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_complete());
        assert_eq!(
            summary.status_line(),
            "historical-transform 2024-06-01: 1 tables loaded (2 rows), 1 skipped, 1 failed"
        );
    }

    #[test]
    fn test_add_load_accumulates() {
        let mut summary = RunSummary::new("daily-transform", date());
        summary.add_load(&load("paths", 3, false));
        summary.add_load(&load("paths", 4, true));

        assert_eq!(
            summary.status("paths"),
            Some(&TableStatus::Loaded {
                batches: 2,
                rows_loaded: 3,
                rows_rejected: 4
            })
        );
        assert!(summary.status_line().ends_with(", 4 rows rejected"));
    }

    #[test]
    fn test_skipped_only_is_complete() {
        let mut summary = RunSummary::new("historical-transform", date());
        summary.set_status("routes", TableStatus::Skipped);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_ingest_summary() {
        let mut summary = IngestSummary::new("daily-ingest", date());
        summary.record_written("506");
        summary.record_failure("507", "timeout");

        let report = PipelineReport::from(summary);
        assert!(!report.is_complete());
        assert_eq!(report.to_string(), "daily-ingest 2024-06-01: 1 written, 1 failed");
    }

    #[test]
    fn test_report_serializes() {
        let mut summary = RunSummary::new("historical-transform", date());
        summary.set_status("routes", TableStatus::Skipped);

        let json = serde_json::to_value(PipelineReport::from(summary)).unwrap();
        assert_eq!(json["date"], "2024-06-01");
        assert_eq!(json["tables"][0]["table"], "routes");
        assert_eq!(json["tables"][0]["status"], "skipped");
    }
}
