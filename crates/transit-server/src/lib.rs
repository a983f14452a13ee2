//! Transit Server
//!
//! HTTP trigger surface for the transit pipelines. A scheduler (or an
//! operator) calls `POST /pipelines/{name}` and gets the run's status line.

pub mod config;
pub mod middleware;
pub mod routes;

pub use routes::{create_router, AppState};
