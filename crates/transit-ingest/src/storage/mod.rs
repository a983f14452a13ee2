//! Object storage for staged raw files
//!
//! Upstream pipelines write raw payloads under `{category}/{YYYY-MM-DD}/{name}`
//! and the transform pipelines read them back. [`ObjectStore`] is the seam;
//! [`S3Storage`] talks to any S3-compatible bucket and [`MemoryStorage`] keeps
//! objects in a map for tests and dry runs.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};
use transit_common::LoadDate;

use crate::error::{IngestError, Result};

pub mod config;
pub mod memory;

pub use memory::MemoryStorage;

/// Top-level staging folders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingArea {
    /// Per-route JSON documents from the transit API
    Daily,
    /// Flat files extracted from the GTFS zip
    Historical,
}

impl StagingArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingArea::Daily => "datos_diarios",
            StagingArea::Historical => "datos_historicos",
        }
    }

    /// `{category}/{date}/`
    pub fn prefix(&self, date: &LoadDate) -> String {
        format!("{}/{}/", self.as_str(), date)
    }

    /// `{category}/{date}/{name}`
    pub fn key(&self, date: &LoadDate, name: &str) -> String {
        format!("{}{}", self.prefix(date), name)
    }
}

/// Narrow interface over a bucket of staged files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    async fn read_text(&self, key: &str) -> Result<String>;

    /// Keys under `prefix`, in the store's listing order
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    async fn write(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
}

/// S3-compatible object store
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: config::StorageConfig) -> Self {
        debug!(bucket = %config.bucket, endpoint = ?config.endpoint, "Initializing storage");

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "transit-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        info!("Storage client initialized for bucket: {}", config.bucket);

        Self {
            client,
            bucket: config.bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(IngestError::Storage(format!(
                        "Failed to check s3://{}/{}: {}",
                        self.bucket, key, e
                    )))
                }
            },
        }
    }

    #[instrument(skip(self))]
    async fn read_text(&self, key: &str) -> Result<String> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| IngestError::Storage(format!("Failed to download {}: {}", key, e)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::Storage(format!("Failed to read body of {}: {}", key, e)))?
            .into_bytes();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        String::from_utf8(data.to_vec())
            .map_err(|e| IngestError::Parse(format!("{} is not valid UTF-8: {}", key, e)))
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    IngestError::Storage(format!("Failed to list prefix {}: {}", prefix, e))
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        debug!("Listed {} objects under s3://{}/{}", keys.len(), self.bucket, prefix);

        Ok(keys)
    }

    #[instrument(skip(self, data))]
    async fn write(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let size = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| IngestError::Storage(format!("Failed to upload {}: {}", key, e)))?;

        info!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);

        Ok(())
    }
}
