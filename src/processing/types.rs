//! Core data types and error taxonomy for the ingestion pipeline.

use crate::extract::ExtractionMethod;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a source document named by a `/process` request.
///
/// Request payload only; it is never persisted by this service and is immutable for the
/// duration of one ingestion call.
#[derive(Debug, Clone, Deserialize)]
pub struct FileReference {
    /// Opaque stable identifier for the uploaded file.
    pub file_id: String,
    /// Optional caller-supplied storage path to try first.
    #[serde(default)]
    pub storage_path_hint: Option<String>,
    /// Optional human-readable name of the file.
    #[serde(default)]
    pub display_name: Option<String>,
    /// MIME type declared by the uploader.
    #[serde(default)]
    pub declared_mime_type: Option<String>,
    /// Optional free-form description supplied at upload time.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional identifier of the uploading principal.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Size in bytes declared by the uploader, checked before any download.
    #[serde(default)]
    pub declared_size_bytes: Option<u64>,
}

/// Metadata attached to every chunk and to the tracking record.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetadata {
    /// Identifier of the source file, carried so chunks can later be deleted in bulk.
    pub source_file_id: String,
    /// Owner of the uploaded file, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Display name of the file, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description of the file, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type the extraction dispatched on.
    pub mime_type: String,
    /// How the text was obtained (`direct` or `ocr`).
    pub extraction_method: ExtractionMethod,
    /// RFC3339 timestamp recorded when extraction completed.
    pub processed_at: String,
}

/// Plain text produced by the content extractor, plus its provenance.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Identifier of the source file.
    pub source_file_id: String,
    /// Extracted text; may be empty.
    pub text: String,
    /// Whether the text came from direct extraction or OCR.
    pub extraction_method: ExtractionMethod,
    /// Metadata propagated to chunks and the tracking record.
    pub metadata: DocumentMetadata,
}

/// A bounded unit of extracted text, the unit of embedding and vector storage.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk text, including the duplicated overlap prefix.
    pub text: String,
    /// 0-based position defining reconstruction order.
    pub order_index: usize,
    /// Number of leading characters duplicated from the previous chunk's tail.
    pub overlap_with_previous: usize,
    /// Copy of the document metadata, carrying `source_file_id` for later deletion.
    pub metadata: DocumentMetadata,
}

/// Summary of a completed ingestion returned to the caller.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// Number of chunks written to the vector store.
    pub chunks_written: usize,
}

/// Reachability snapshot of the vector store used by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Whether the vector store responded to a describe call.
    pub vector_store_reachable: bool,
    /// Number of points in the collection, when the store reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_count: Option<u64>,
    /// Diagnostic captured when the store was unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failure taxonomy for the ingestion pipeline.
///
/// Every collaborator error is classified into exactly one of these kinds at its call site;
/// no raw collaborator error reaches the caller.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request was missing required fields or malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Declared or actual size exceeds the configured limit.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Size that tripped the limit.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },
    /// Declared MIME type is not supported.
    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),
    /// Bytes declared as text were not valid UTF-8.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    /// No blob was found at any candidate storage path.
    #[error("File not found in storage: {file_id}")]
    NotFound {
        /// File the caller asked for.
        file_id: String,
    },
    /// The storage backend could not be reached; the caller may retry.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Both direct extraction and the OCR fallback failed.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
    /// The embedding provider failed to produce vectors.
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),
    /// The vector store rejected or failed the upsert.
    #[error("Vector store write failed: {0}")]
    VectorStoreWriteFailed(String),
    /// Vectors were written but the tracking upsert failed; state is inconsistent and a
    /// reconciliation retry of the tracking write alone is warranted.
    #[error("Tracking write failed after vectors were written: {0}")]
    TrackingWriteFailed(String),
    /// Catch-all for failures outside the taxonomy; always logged with full context.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl IngestError {
    /// Stable machine-readable kind reported to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::UnsupportedMimeType(_) => "unsupported_mime_type",
            Self::UnsupportedEncoding(_) => "unsupported_encoding",
            Self::NotFound { .. } => "not_found",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::EmbeddingFailed(_) => "embedding_failed",
            Self::VectorStoreWriteFailed(_) => "vector_store_write_failed",
            Self::TrackingWriteFailed(_) => "tracking_write_failed",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

impl From<crate::extract::ExtractError> for IngestError {
    fn from(error: crate::extract::ExtractError) -> Self {
        use crate::extract::ExtractError;
        match error {
            ExtractError::UnsupportedMimeType(mime) => Self::UnsupportedMimeType(mime),
            ExtractError::UnsupportedEncoding(reason) => Self::UnsupportedEncoding(reason),
            ExtractError::Failed(reason) => Self::ExtractionFailed(reason),
        }
    }
}
