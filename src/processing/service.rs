//! Ingestion orchestrator coordinating storage, extraction, chunking, embedding, and writes.
//!
//! One request moves through `Received → Located → Extracted → Chunked → Indexed → Tracked`;
//! any stage can terminate the flow with a single classified [`IngestError`]. The write order
//! is fixed: vectors first, tracking second, so a `processed = true` tracking row can never
//! point at content that is not searchable. Concurrent requests for the same file id are
//! serialized with a per-file lock; the vectors-then-tracking pair is the unit they race over.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, HttpEmbeddingClient},
    extract::{ContentExtractor, QualityThresholds, ocr::PdfiumTesseractOcr},
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        chunking,
        types::{
            DocumentMetadata, ExtractedDocument, FileReference, HealthSnapshot, IngestError,
            IngestOutcome,
        },
    },
    qdrant::{
        QdrantService, VectorIndex, VectorPoint, build_payload, chunk_point_id,
        compute_chunk_hash, current_timestamp_rfc3339,
    },
    storage::{BlobStore, StorageError, SupabaseStorageClient, locate_and_fetch},
    tracking::{PostgrestTrackingClient, TrackingStore},
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Size and chunking limits enforced by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct PipelineLimits {
    /// Maximum accepted upload size in bytes, checked before any storage call.
    pub max_upload_bytes: u64,
    /// Hard upper bound on chunk length in characters.
    pub chunk_max_chars: usize,
    /// Characters duplicated from the previous chunk's tail.
    pub chunk_overlap_chars: usize,
}

/// Abstraction over the ingestion pipeline used by the HTTP surface.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Run the full ingestion pipeline for one file.
    async fn process_file(&self, request: FileReference) -> Result<IngestOutcome, IngestError>;

    /// Remove a file's vectors and mark its tracking record unprocessed.
    async fn delete_file(&self, file_id: &str) -> Result<(), IngestError>;

    /// Probe the vector store for a health snapshot.
    async fn health(&self) -> HealthSnapshot;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the ingestion pipeline across its injected collaborators.
///
/// The service owns long-lived handles to the blob store, extractor, embedding client, vector
/// index, and tracking store. Construct it once near process start and share it through an
/// `Arc`; nothing in here is per-request state except the per-file locks.
pub struct IngestionService {
    blob_store: Box<dyn BlobStore>,
    extractor: ContentExtractor,
    embedding_client: Box<dyn EmbeddingClient>,
    vector_index: Box<dyn VectorIndex>,
    tracking_store: Box<dyn TrackingStore>,
    limits: PipelineLimits,
    metrics: Arc<IngestMetrics>,
    file_locks: FileLocks,
}

impl IngestionService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        blob_store: Box<dyn BlobStore>,
        extractor: ContentExtractor,
        embedding_client: Box<dyn EmbeddingClient>,
        vector_index: Box<dyn VectorIndex>,
        tracking_store: Box<dyn TrackingStore>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            blob_store,
            extractor,
            embedding_client,
            vector_index,
            tracking_store,
            limits,
            metrics: Arc::new(IngestMetrics::new()),
            file_locks: FileLocks::default(),
        }
    }

    /// Build the production service from the loaded configuration, ensuring the vector
    /// collection exists before accepting traffic.
    pub async fn from_config() -> Self {
        let config = get_config();
        tracing::info!("Initializing ingestion collaborators");

        let blob_store =
            SupabaseStorageClient::from_config(config).expect("Failed to build storage client");
        let embedding_client =
            HttpEmbeddingClient::from_config(config).expect("Failed to build embedding client");
        let tracking_store =
            PostgrestTrackingClient::from_config(config).expect("Failed to build tracking client");
        let vector_index =
            QdrantService::from_config(config).expect("Failed to connect to Qdrant");
        vector_index
            .ensure_collection(config.embedding_dimension as u64)
            .await
            .expect("Failed to ensure Qdrant collection exists");
        tracing::debug!(collection = %config.qdrant_collection_name, "Vector collection ready");

        let extractor = ContentExtractor::new(
            Box::new(PdfiumTesseractOcr::new(
                config.ocr_dpi,
                config.ocr_language.clone(),
            )),
            QualityThresholds {
                min_chars: config.pdf_quality_min_chars,
                min_alnum_ratio: config.pdf_quality_min_alnum_ratio,
            },
        );

        Self::new(
            Box::new(blob_store),
            extractor,
            Box::new(embedding_client),
            Box::new(vector_index),
            Box::new(tracking_store),
            PipelineLimits {
                max_upload_bytes: config.max_upload_bytes,
                chunk_max_chars: config.chunk_max_chars,
                chunk_overlap_chars: config.chunk_overlap_chars,
            },
        )
    }

    /// Run the full ingestion pipeline for one file.
    pub async fn process_file(
        &self,
        request: FileReference,
    ) -> Result<IngestOutcome, IngestError> {
        let file_id = request.file_id.trim().to_string();
        if file_id.is_empty() {
            return Err(IngestError::BadRequest("file_id is required".to_string()));
        }

        if let Some(declared) = request.declared_size_bytes
            && declared > self.limits.max_upload_bytes
        {
            return Err(IngestError::PayloadTooLarge {
                size: declared,
                limit: self.limits.max_upload_bytes,
            });
        }

        let lock = self.file_locks.lock_for(&file_id);
        let outcome = {
            let _guard = lock.lock().await;
            tracing::info!(file_id = %file_id, "Processing file");
            self.ingest_file(&file_id, &request).await
        };
        drop(lock);
        self.file_locks.release(&file_id);
        outcome
    }

    /// Pipeline body run under the per-file lock.
    async fn ingest_file(
        &self,
        file_id: &str,
        request: &FileReference,
    ) -> Result<IngestOutcome, IngestError> {
        let (path, bytes) = locate_and_fetch(
            self.blob_store.as_ref(),
            file_id,
            request.owner_id.as_deref(),
            request.storage_path_hint.as_deref(),
        )
        .await
        .map_err(|error| match error {
            StorageError::NotFound => IngestError::NotFound {
                file_id: file_id.to_string(),
            },
            StorageError::Unavailable(reason) => IngestError::StorageUnavailable(reason),
        })?;

        if bytes.len() as u64 > self.limits.max_upload_bytes {
            return Err(IngestError::PayloadTooLarge {
                size: bytes.len() as u64,
                limit: self.limits.max_upload_bytes,
            });
        }

        let mime_type = request
            .declared_mime_type
            .as_deref()
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .unwrap_or("text/plain")
            .to_string();

        let (text, extraction_method) = self.extractor.extract(&bytes, &mime_type).await?;
        let document = ExtractedDocument {
            source_file_id: file_id.to_string(),
            text,
            extraction_method,
            metadata: DocumentMetadata {
                source_file_id: file_id.to_string(),
                owner_id: request.owner_id.clone(),
                display_name: request.display_name.clone(),
                description: request.description.clone(),
                mime_type,
                extraction_method,
                processed_at: current_timestamp_rfc3339(),
            },
        };
        tracing::debug!(
            file_id = %file_id,
            path = %path,
            method = extraction_method.as_str(),
            chars = document.text.len(),
            "Text extracted"
        );

        let chunks = chunking::split(
            &document.text,
            &document.metadata,
            self.limits.chunk_max_chars,
            self.limits.chunk_overlap_chars,
        );
        let chunk_count = chunks.len();

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self
                .embedding_client
                .generate_embeddings(texts)
                .await
                .map_err(|error| IngestError::EmbeddingFailed(error.to_string()))?;
            if embeddings.len() != chunks.len() {
                return Err(IngestError::EmbeddingFailed(format!(
                    "provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                )));
            }

            let points: Vec<VectorPoint> = chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| VectorPoint {
                    id: chunk_point_id(file_id, chunk.order_index),
                    vector,
                    payload: build_payload(chunk, &compute_chunk_hash(&chunk.text)),
                })
                .collect();

            self.vector_index
                .upsert(points)
                .await
                .map_err(|error| IngestError::VectorStoreWriteFailed(error.to_string()))?;
        }

        // Vectors are in; only now may the tracking row claim the file is processed.
        let metadata_value = serde_json::to_value(&document.metadata)
            .map_err(|error| IngestError::Unexpected(error.to_string()))?;
        self.tracking_store
            .upsert_record(file_id, true, metadata_value)
            .await
            .map_err(|error| IngestError::TrackingWriteFailed(error.to_string()))?;

        self.metrics.record_file(chunk_count as u64);
        tracing::info!(file_id = %file_id, chunks = chunk_count, "File ingested");

        Ok(IngestOutcome {
            chunks_written: chunk_count,
        })
    }

    /// Remove a file's vectors and mark its tracking record unprocessed.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), IngestError> {
        let file_id = file_id.trim();
        if file_id.is_empty() {
            return Err(IngestError::BadRequest("file_id is required".to_string()));
        }

        let lock = self.file_locks.lock_for(file_id);
        let result = {
            let _guard = lock.lock().await;
            self.remove_file(file_id).await
        };
        drop(lock);
        self.file_locks.release(file_id);
        result
    }

    /// Deletion body run under the per-file lock.
    async fn remove_file(&self, file_id: &str) -> Result<(), IngestError> {
        self.vector_index
            .delete_by_source_file(file_id)
            .await
            .map_err(|error| IngestError::VectorStoreWriteFailed(error.to_string()))?;
        self.tracking_store
            .upsert_record(file_id, false, json!({ "source_file_id": file_id }))
            .await
            .map_err(|error| IngestError::TrackingWriteFailed(error.to_string()))?;

        self.metrics.record_deletion();
        tracing::info!(file_id, "File removed from index");
        Ok(())
    }

    /// Probe the vector store to surface a lightweight health snapshot.
    pub async fn health(&self) -> HealthSnapshot {
        match self.vector_index.describe().await {
            Ok(stats) => HealthSnapshot {
                vector_store_reachable: true,
                points_count: stats.points_count,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Vector store health probe failed");
                HealthSnapshot {
                    vector_store_reachable: false,
                    points_count: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl IngestionApi for IngestionService {
    async fn process_file(&self, request: FileReference) -> Result<IngestOutcome, IngestError> {
        IngestionService::process_file(self, request).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), IngestError> {
        IngestionService::delete_file(self, file_id).await
    }

    async fn health(&self) -> HealthSnapshot {
        IngestionService::health(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestionService::metrics_snapshot(self)
    }
}

/// Per-file-id async locks serializing concurrent ingestions of the same file.
///
/// Entries are evicted by [`FileLocks::release`] once the last holder drops its handle, so
/// the map stays proportional to in-flight requests rather than every file ever seen.
#[derive(Default)]
struct FileLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLocks {
    fn lock_for(&self, file_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("file lock map poisoned");
        map.entry(file_id.to_string()).or_default().clone()
    }

    /// Drop the map entry when no task still holds a handle to it.
    ///
    /// Callers must drop their `Arc` before releasing; a strong count above one means
    /// another request is waiting on or about to take the lock, and the entry stays.
    fn release(&self, file_id: &str) {
        let mut map = self.inner.lock().expect("file lock map poisoned");
        if let Some(lock) = map.get(file_id)
            && Arc::strong_count(lock) == 1
        {
            map.remove(file_id);
        }
    }
}
