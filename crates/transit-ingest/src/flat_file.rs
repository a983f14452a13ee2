//! Delimited flat-file parsing
//!
//! Staged GTFS files are comma-separated text with a header row. Each data
//! line becomes a [`Row`] keyed by the header field at the same position.
//! Values stay as text; typing happens at load time against the table schema.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::Result;

const BOM: char = '\u{feff}';

/// Field name to raw text value
pub type Row = BTreeMap<String, String>;

/// Header field with any leading byte-order marks removed
fn clean_header(field: &str) -> String {
    field.trim_start_matches(BOM).to_string()
}

/// Parse delimited text with a header row into rows.
///
/// Double-quoted fields may contain commas. Empty content yields no rows.
/// A line shorter than the header omits its trailing fields and a longer line
/// drops its surplus values; both are logged. Blank lines are skipped.
pub fn parse(content: &str) -> Result<Vec<Row>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(clean_header).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();

    for record in records {
        let record = record?;
        if is_blank(&record) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.len() != header.len() {
            warn!(
                line,
                expected = header.len(),
                found = record.len(),
                "Field count does not match header"
            );
        }

        let row: Row = header
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        rows.push(row);
    }

    debug!("Parsed {} rows with {} header fields", rows.len(), header.len());

    Ok(rows)
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================
