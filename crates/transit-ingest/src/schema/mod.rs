//! Static table schemas and value coercion
//!
//! Every destination table is declared once as a [`TableSchema`]: an ordered
//! list of (field, [`FieldType`]) pairs. Schemas are never inferred from data.
//! Before a row is handed to the table store it is coerced against its schema
//! so that type mismatches surface as row-level errors.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod daily;
pub mod gtfs;

/// A typed row ready for the table store
pub type Record = serde_json::Map<String, Value>;

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }

    /// Postgres column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::String => "TEXT",
            FieldType::Integer => "BIGINT",
            FieldType::Float => "DOUBLE PRECISION",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMPTZ",
        }
    }

    /// Convert a raw flat-file value.
    ///
    /// Empty text is NULL for every type except STRING, which keeps it.
    pub fn coerce_text(&self, raw: &str) -> Result<Value, String> {
        if *self == FieldType::String {
            return Ok(Value::String(raw.to_string()));
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }

        match self {
            FieldType::String => Ok(Value::String(raw.to_string())),
            FieldType::Integer => trimmed
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{}' is not a valid INTEGER", raw)),
            FieldType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a valid FLOAT", raw)),
            FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a valid BOOLEAN", raw)),
            },
            FieldType::Timestamp => parse_timestamp(trimmed)
                .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true)))
                .ok_or_else(|| format!("'{}' is not a valid TIMESTAMP", raw)),
        }
    }

    /// Check an already-typed JSON value, converting where the conversion is lossless
    pub fn coerce_value(&self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (_, Value::String(s)) => self.coerce_text(s),
            (FieldType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (FieldType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (FieldType::String, other) => Ok(Value::String(other.to_string())),
            (FieldType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| format!("{} is not a valid INTEGER", n)),
            (FieldType::Float, Value::Number(n)) => Ok(Value::Number(n.clone())),
            (FieldType::Boolean, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (FieldType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(format!("{} is not a valid BOOLEAN", n)),
            },
            (ty, other) => Err(format!("{} is not a valid {}", other, ty.as_str())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Zone-less ISO-8601 is taken as UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// One declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl FieldSchema {
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// Declared layout of one destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSchema],
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Coerce every value of `record` to its declared type.
    ///
    /// Fields absent from the record stay absent (NULL on insert). A field the
    /// schema does not declare is an error.
    pub fn coerce_record(&self, record: &Record) -> Result<Record, String> {
        let mut typed = Record::new();

        for (name, value) in record {
            let field = self
                .field(name)
                .ok_or_else(|| format!("no such field: {}", name))?;

            let coerced = field
                .field_type
                .coerce_value(value)
                .map_err(|e| format!("field {}: {}", name, e))?;

            typed.insert(name.clone(), coerced);
        }

        Ok(typed)
    }
}

/// Find a table by name within a set of declarations
pub fn find_table(tables: &'static [TableSchema], name: &str) -> Option<&'static TableSchema> {
    tables.iter().find(|t| t.name == name)
}

// ============================================================================
// Tests
// ============================================================================
