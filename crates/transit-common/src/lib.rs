//! Transit Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the transit pipelines.
//!
//! # Overview
//!
//! - **Error Handling**: [`TransitError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Types**: [`LoadDate`], the date label every pipeline run is keyed on
//!
//! # Example
//!
//! ```no_run
//! use transit_common::{LoadDate, Result};
//!
//! fn staged_prefix(date: &str) -> Result<String> {
//!     let date: LoadDate = date.parse()?;
//!     Ok(format!("datos_historicos/{}/", date))
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TransitError};
pub use types::LoadDate;
