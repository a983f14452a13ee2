//! Transit authority REST client

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{IngestError, Result};
use crate::http;

pub struct TransitApiClient {
    client: Client,
    base_url: String,
}

impl TransitApiClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/getservicios/all`
    ///
    /// Codes may arrive as JSON strings or numbers; anything else is dropped.
    #[instrument(skip(self))]
    pub async fn service_codes(&self) -> Result<Vec<String>> {
        let url = format!("{}/getservicios/all", self.base_url);

        let codes: Vec<Value> = http::get(&self.client, &url)
            .await?
            .json()
            .await
            .map_err(|e| IngestError::upstream(&url, format!("invalid service list: {}", e)))?;

        let codes: Vec<String> = codes
            .into_iter()
            .filter_map(|code| match code {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                other => {
                    warn!("Ignoring service code {}", other);
                    None
                },
            })
            .collect();

        debug!("Fetched {} service codes", codes.len());

        Ok(codes)
    }

    /// `GET {base}/conocerecorrido?codsint={code}`, returned as received
    #[instrument(skip(self))]
    pub async fn route_detail(&self, code: &str) -> Result<Value> {
        let endpoint = format!("{}/conocerecorrido", self.base_url);
        let url = Url::parse_with_params(&endpoint, &[("codsint", code)])
            .map_err(|e| IngestError::upstream(&endpoint, e))?;

        let detail: Value = http::get(&self.client, url.as_str())
            .await?
            .json()
            .await
            .map_err(|e| IngestError::upstream(url.as_str(), format!("invalid route detail: {}", e)))?;

        if is_empty_document(&detail) {
            return Err(IngestError::upstream(url.as_str(), "empty route detail"));
        }

        Ok(detail)
    }
}

fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_service_codes_accepts_strings_and_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getservicios/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["506", 210, null, "B02"])))
            .mount(&server)
            .await;

        let client = TransitApiClient::new(server.uri(), 5).unwrap();
        let codes = client.service_codes().await.unwrap();

        assert_eq!(codes, vec!["506", "210", "B02"]);
    }

    #[tokio::test]
    async fn test_route_detail_passes_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conocerecorrido"))
            .and(query_param("codsint", "506"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "negocio": { "id": 1 } })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TransitApiClient::new(format!("{}/", server.uri()), 5).unwrap();
        let detail = client.route_detail("506").await.unwrap();

        assert_eq!(detail["negocio"]["id"], 1);
    }

    #[tokio::test]
    async fn test_route_detail_empty_document_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = TransitApiClient::new(server.uri(), 5).unwrap();
        assert!(client.route_detail("506").await.unwrap_err().is_upstream());
    }

    #[tokio::test]
    async fn test_service_codes_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = TransitApiClient::new(server.uri(), 5).unwrap();
        assert!(client.service_codes().await.unwrap_err().is_upstream());
    }
}
