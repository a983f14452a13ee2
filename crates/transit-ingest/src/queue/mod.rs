//! Message queue publishing
//!
//! The realtime daily ingest publishes each route document to a topic instead
//! of staging it in object storage. [`PubSubPublisher`] speaks the Pub/Sub REST
//! API; the bearer token, when configured, is passed through untouched.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::PubSubConfig;
use crate::error::{IngestError, Result};

pub mod memory;

pub use memory::MemoryPublisher;

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one message, returning the id the queue assigned to it
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Google Pub/Sub publisher over REST
pub struct PubSubPublisher {
    client: Client,
    endpoint: String,
    project_id: String,
    access_token: Option<String>,
}

impl PubSubPublisher {
    pub fn new(config: &PubSubConfig, timeout_secs: u64) -> Result<Self> {
        if config.project_id.is_empty() {
            return Err(IngestError::Config(
                "PUBSUB_PROJECT_ID is required to publish".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn publish_url(&self, topic: &str) -> String {
        format!(
            "{}/v1/projects/{}/topics/{}:publish",
            self.endpoint, self.project_id, topic
        )
    }
}

#[async_trait]
impl MessagePublisher for PubSubPublisher {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<String> {
        let url = self.publish_url(topic);
        let body = PublishRequest {
            messages: vec![OutgoingMessage {
                data: STANDARD.encode(data),
            }],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IngestError::Publish(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IngestError::Publish(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| IngestError::Publish(format!("Invalid publish response: {}", e)))?;

        let id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::Publish("Publish response carried no message id".to_string()))?;

        debug!("Published message {} to {}", id, topic);

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str, token: Option<&str>) -> PubSubConfig {
        PubSubConfig {
            endpoint: endpoint.to_string(),
            project_id: "transit-project".to_string(),
            topic: "get_daily_data".to_string(),
            access_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_requires_project_id() {
        let mut cfg = config("http://localhost", None);
        cfg.project_id.clear();
        assert!(matches!(PubSubPublisher::new(&cfg, 5), Err(IngestError::Config(_))));
    }

    #[tokio::test]
    async fn test_publish_encodes_and_returns_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/projects/transit-project/topics/get_daily_data:publish"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "messages": [{ "data": "eyJhIjoxfQ==" }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "messageIds": ["42"] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = PubSubPublisher::new(&config(&server.uri(), Some("secret")), 5).unwrap();
        let id = publisher.publish("get_daily_data", br#"{"a":1}"#).await.unwrap();

        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn test_publish_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let publisher = PubSubPublisher::new(&config(&server.uri(), None), 5).unwrap();
        let err = publisher.publish("get_daily_data", b"{}").await.unwrap_err();

        assert!(matches!(err, IngestError::Publish(msg) if msg.contains("403")));
    }
}
