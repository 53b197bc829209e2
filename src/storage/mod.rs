//! Object storage access and the candidate-path blob locator.
//!
//! Uploaded files are addressed by logical identifiers rather than exact storage paths, and
//! historical uploads landed under several path conventions. [`locate_and_fetch`] hides that
//! drift: it walks a deterministic list of candidate paths and returns the first non-empty
//! payload, distinguishing "nothing stored under any path" from "the backend is unreachable"
//! so callers know whether a retry can help.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by blob storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object exists at the requested path.
    #[error("Object not found")]
    NotFound,
    /// The storage backend could not be reached or answered with a server error.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Interface implemented by blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the object stored at `path`, returning its raw bytes.
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the ordered list of storage paths to try for a file.
///
/// Order of preference: the caller-supplied hint, then `{owner_id}/{file_id}`, then the bare
/// `{file_id}`. Duplicates are dropped so the backend is not asked twice for the same path.
pub fn candidate_paths(
    file_id: &str,
    owner_id: Option<&str>,
    hint_path: Option<&str>,
) -> Vec<String> {
    let mut paths = Vec::with_capacity(3);
    if let Some(hint) = hint_path.map(str::trim).filter(|hint| !hint.is_empty()) {
        paths.push(hint.to_string());
    }
    if let Some(owner) = owner_id.map(str::trim).filter(|owner| !owner.is_empty()) {
        let owned = format!("{owner}/{file_id}");
        if !paths.contains(&owned) {
            paths.push(owned);
        }
    }
    let bare = file_id.to_string();
    if !paths.contains(&bare) {
        paths.push(bare);
    }
    paths
}

/// Fetch a file's bytes from the first candidate path that yields a non-empty payload.
///
/// Misses and empty payloads move on to the next candidate. Transport failures are also
/// retried against the remaining candidates, but are remembered: if no candidate succeeds and
/// at least one path failed at the transport level, the result is
/// [`StorageError::Unavailable`] (retryable) rather than [`StorageError::NotFound`].
pub async fn locate_and_fetch(
    store: &dyn BlobStore,
    file_id: &str,
    owner_id: Option<&str>,
    hint_path: Option<&str>,
) -> Result<(String, Vec<u8>), StorageError> {
    let mut transport_failure: Option<String> = None;

    for path in candidate_paths(file_id, owner_id, hint_path) {
        match store.download(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                tracing::debug!(file_id, path = %path, size = bytes.len(), "Blob located");
                return Ok((path, bytes));
            }
            Ok(_) => {
                tracing::debug!(file_id, path = %path, "Empty payload; trying next path");
            }
            Err(StorageError::NotFound) => {
                tracing::debug!(file_id, path = %path, "Blob missing; trying next path");
            }
            Err(StorageError::Unavailable(reason)) => {
                tracing::warn!(file_id, path = %path, reason = %reason, "Storage call failed");
                transport_failure = Some(reason);
            }
        }
    }

    match transport_failure {
        Some(reason) => Err(StorageError::Unavailable(reason)),
        None => Err(StorageError::NotFound),
    }
}

/// HTTP client for the Supabase storage API.
pub struct SupabaseStorageClient {
    client: Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl SupabaseStorageClient {
    /// Construct a client for the given storage endpoint and bucket.
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .user_agent("ingestd/0.3")
            .timeout(timeout)
            .build()
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key: api_key.into(),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        Self::new(
            config.storage_base_url(),
            config.storage_bucket.clone(),
            config.supabase_service_key.clone(),
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl BlobStore for SupabaseStorageClient {
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| StorageError::Unavailable(err.to_string()))?;
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(StorageError::NotFound),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::Unavailable(format!(
                    "storage returned {status}: {body}"
                )))
            }
        }
    }
}
