//! Read-only HTTP origin.

use crate::error::{StorageError, StorageResult};
use crate::traits::BlobSource;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use spool_core::BlobHash;
use std::time::Duration;
use tracing::instrument;

/// Fetches blobs from `GET {endpoint}/{hash}`.
pub struct HttpStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStore {
    pub fn new(endpoint: &str, timeout: Duration) -> StorageResult<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(StorageError::Config("http origin endpoint is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    fn blob_url(&self, hash: &BlobHash) -> String {
        format!("{}/{}", self.endpoint, hash.to_hex())
    }
}

#[async_trait]
impl BlobSource for HttpStore {
    #[instrument(skip(self), fields(backend = "http"))]
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        let response = self.client.get(self.blob_url(hash)).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(hash.to_hex())),
            status => {
                return Err(StorageError::Http(format!(
                    "origin returned {status} for {hash}"
                )));
            }
        }

        let data = response.bytes().await?;
        hash.verify(&data)?;
        Ok(data)
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
