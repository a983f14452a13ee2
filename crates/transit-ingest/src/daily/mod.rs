//! Daily route pipelines
//!
//! - [`collector::DailyRouteCollector`] fetches every route from the transit
//!   API and stages it in object storage or publishes it to a topic
//! - [`transform::DailyRouteTransformer`] flattens staged routes into tables

pub mod client;
pub mod collector;
pub mod models;
pub mod transform;

pub use client::TransitApiClient;
pub use collector::{DailyRouteCollector, RouteSink};
pub use transform::DailyRouteTransformer;
