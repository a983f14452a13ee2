//! Common types used across the transit pipelines

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TransitError;

const LOAD_DATE_FORMAT: &str = "%Y-%m-%d";

/// Date a pipeline run is keyed on.
///
/// Renders as `YYYY-MM-DD`; the same string is the staging path segment
/// (`datos_historicos/2024-06-01/...`) and the `periodo_de_carga` label written
/// on every loaded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoadDate(NaiveDate);

impl LoadDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in the local timezone
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Label written to the `periodo_de_carga` column
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LoadDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(LOAD_DATE_FORMAT))
    }
}

impl FromStr for LoadDate {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), LOAD_DATE_FORMAT)
            .map(Self)
            .map_err(|_| TransitError::InvalidDate {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for LoadDate {
    type Error = TransitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LoadDate> for String {
    fn from(date: LoadDate) -> Self {
        date.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let date: LoadDate = "2024-06-01".parse().unwrap();
        assert_eq!(date.to_string(), "2024-06-01");
        assert_eq!(date.label(), "2024-06-01");
    }

    #[test]
    fn test_parse_rejects_other_formats() {
        assert!("01/06/2024".parse::<LoadDate>().is_err());
        assert!("2024-13-01".parse::<LoadDate>().is_err());
        assert!("".parse::<LoadDate>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let date: LoadDate = "2024-06-01".parse().unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"2024-06-01\"");

        let back: LoadDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }
}
