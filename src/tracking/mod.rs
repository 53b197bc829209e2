//! Relational tracking of ingestion state.
//!
//! One row per source file, upserted through PostgREST with `on_conflict` on the file id.
//! The pipeline only ever writes this row after the vector store write has succeeded, so a
//! `processed = true` row always corresponds to searchable content.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while upserting tracking records.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The relational store could not be reached or rejected the write.
    #[error("Tracking store request failed: {0}")]
    Request(String),
}

/// Interface implemented by the relational tracking store.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Insert or overwrite the tracking record for `file_id`.
    async fn upsert_record(
        &self,
        file_id: &str,
        processed: bool,
        metadata: Value,
    ) -> Result<(), TrackingError>;
}

/// PostgREST-backed tracking store client.
pub struct PostgrestTrackingClient {
    client: Client,
    base_url: String,
    table: String,
    api_key: String,
}

impl PostgrestTrackingClient {
    /// Construct a client for the given PostgREST endpoint and table.
    pub fn new(
        base_url: impl Into<String>,
        table: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TrackingError> {
        let client = Client::builder()
            .user_agent("ingestd/0.3")
            .timeout(timeout)
            .build()
            .map_err(|err| TrackingError::Request(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: table.into(),
            api_key: api_key.into(),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, TrackingError> {
        Self::new(
            config.rest_base_url(),
            config.tracking_table.clone(),
            config.supabase_service_key.clone(),
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl TrackingStore for PostgrestTrackingClient {
    async fn upsert_record(
        &self,
        file_id: &str,
        processed: bool,
        metadata: Value,
    ) -> Result<(), TrackingError> {
        let url = format!("{}/{}", self.base_url, self.table);
        let body = json!({
            "file_id": file_id,
            "processed": processed,
            "metadata": metadata,
            "updated_at": crate::qdrant::current_timestamp_rfc3339(),
        });

        let response = self
            .client
            .post(&url)
            .query(&[("on_conflict", "file_id")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|err| TrackingError::Request(err.to_string()))?;

        if response.status().is_success() {
            tracing::debug!(file_id, processed, "Tracking record upserted");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TrackingError::Request(format!(
                "tracking store returned {status}: {body}"
            )))
        }
    }
}
