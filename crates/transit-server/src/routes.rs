//! Pipeline trigger endpoints
//!
//! `POST /pipelines/{name}?date=YYYY-MM-DD` runs one pipeline to completion
//! and answers with its status line:
//!
//! | Outcome                         | Status |
//! |---------------------------------|--------|
//! | every item processed            | 200    |
//! | finished with per-item failures | 207    |
//! | upstream source unavailable     | 502    |
//! | anything else                   | 500    |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use transit_common::LoadDate;
use transit_ingest::{IngestError, Pipeline, PipelineContext, PipelineReport};

use crate::middleware;

#[derive(Clone)]
pub struct AppState {
    pub context: PipelineContext,
}

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    pub date: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pipelines/:name", post(trigger))
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "pipelines": Pipeline::ALL.iter().map(Pipeline::name).collect::<Vec<_>>()
    }))
}

async fn trigger(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<TriggerParams>,
) -> Response {
    let Ok(pipeline) = name.parse::<Pipeline>() else {
        return (StatusCode::NOT_FOUND, format!("Unknown pipeline: {}", name)).into_response();
    };

    let date = match params.date.as_deref().map(str::parse::<LoadDate>) {
        None => LoadDate::today(),
        Some(Ok(date)) => date,
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    info!("Triggered {} for {}", pipeline, date);

    let result = state.context.run(pipeline, date).await;
    let (status, body) = respond(pipeline, result);
    (status, body).into_response()
}

/// Status code and body for a finished run
pub fn respond(pipeline: Pipeline, result: Result<PipelineReport, IngestError>) -> (StatusCode, String) {
    match result {
        Ok(report) if report.is_complete() => (StatusCode::OK, report.status_line()),
        Ok(report) => (StatusCode::MULTI_STATUS, report.status_line()),
        Err(e) => {
            error!("{} failed: {}", pipeline, e);
            let status = if e.is_upstream() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, format!("{} failed: {}", pipeline, e))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_ingest::summary::IngestSummary;

    fn date() -> LoadDate {
        "2024-06-01".parse().unwrap()
    }

    #[test]
    fn test_respond_complete() {
        let report = IngestSummary::new("daily-ingest", date()).into();
        let (status, body) = respond(Pipeline::DailyIngest, Ok(report));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "daily-ingest 2024-06-01: 0 written, 0 failed");
    }

    #[test]
    fn test_respond_partial() {
        let mut summary = IngestSummary::new("daily-ingest", date());
        summary.record_failure("506", "timeout");
        let (status, _) = respond(Pipeline::DailyIngest, Ok(summary.into()));
        assert_eq!(status, StatusCode::MULTI_STATUS);
    }

    #[test]
    fn test_respond_upstream_failure() {
        let err = IngestError::upstream("http://feed", "HTTP 503");
        let (status, body) = respond(Pipeline::HistoricalIngest, Err(err));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.starts_with("historical-ingest failed:"));
    }

    #[test]
    fn test_respond_other_failure() {
        let err = IngestError::Storage("bucket missing".to_string());
        let (status, _) = respond(Pipeline::DailyTransform, Err(err));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
