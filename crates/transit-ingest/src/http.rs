//! Shared HTTP plumbing for upstream sources
//!
//! Every upstream call is a single attempt. Transport failures and non-success
//! statuses both surface as [`IngestError::UpstreamFetch`].

use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use crate::error::{IngestError, Result};

const USER_AGENT: &str = concat!("transit-ingest/", env!("CARGO_PKG_VERSION"));

pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}

/// GET `url`, failing on transport errors and non-2xx statuses
pub async fn get(client: &Client, url: &str) -> Result<Response> {
    debug!("GET {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| IngestError::upstream(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::upstream(url, format!("HTTP {}", status)));
    }

    Ok(response)
}

pub async fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = get(client, url).await?;
    let body = response
        .bytes()
        .await
        .map_err(|e| IngestError::upstream(url, e))?;
    Ok(body.to_vec())
}
