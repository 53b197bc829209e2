//! Embedding client abstraction and HTTP adapters.
//!
//! The pipeline treats embedding as an opaque text-to-vector collaborator behind
//! [`EmbeddingClient`]. Two provider shapes are supported: an OpenAI-compatible
//! `/v1/embeddings` batch endpoint, and Ollama's per-prompt `/api/embeddings` endpoint.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// HTTP embedding client targeting either provider shape.
pub struct HttpEmbeddingClient {
    client: Client,
    provider: EmbeddingProvider,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingsResponse {
    data: Vec<OpenAiEmbeddingRow>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingRow {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    /// Construct a client for the given provider endpoint.
    pub fn new(
        provider: EmbeddingProvider,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let client = Client::builder()
            .user_agent("ingestd/0.3")
            .timeout(timeout)
            .build()
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
        Ok(Self {
            client,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        Self::new(
            config.embedding_provider,
            config.embedding_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
            config.request_timeout(),
        )
    }

    async fn embed_openai(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "embedding provider returned {status}: {body}"
            )));
        }

        let payload: OpenAiEmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
        Ok(payload.data.into_iter().map(|row| row.embedding).collect())
    }

    async fn embed_ollama(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self
                .client
                .post(&url)
                .json(&json!({ "model": self.model, "prompt": text }))
                .send()
                .await
                .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(EmbeddingClientError::GenerationFailed(format!(
                    "embedding provider returned {status}: {body}"
                )));
            }
            let payload: OllamaEmbeddingResponse = response
                .json()
                .await
                .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
            vectors.push(payload.embedding);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            provider = ?self.provider,
            model = %self.model,
            batch = texts.len(),
            "Generating embeddings"
        );

        let expected = texts.len();
        let vectors = match self.provider {
            EmbeddingProvider::OpenAI => self.embed_openai(texts).await?,
            EmbeddingProvider::Ollama => self.embed_ollama(texts).await?,
        };

        if vectors.len() != expected {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                expected
            )));
        }

        Ok(vectors)
    }
}
