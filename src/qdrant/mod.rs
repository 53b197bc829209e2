//! Qdrant vector store integration.
//!
//! The pipeline depends only on the narrow [`VectorIndex`] interface (`upsert`,
//! `delete_by_source_file`, `describe`); everything Qdrant-specific (endpoint shapes, payload
//! construction, deterministic point ids) lives in this module so client-version drift stays
//! at the system boundary.

mod client;
mod payload;
mod types;

pub use client::QdrantService;
pub use payload::{build_payload, chunk_point_id, compute_chunk_hash, current_timestamp_rfc3339};
pub use types::{IndexStats, QdrantError, VectorPoint};

use async_trait::async_trait;

/// Narrow interface the ingestion pipeline requires from a vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotently write the given points; ids are stable so repeats overwrite.
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), QdrantError>;

    /// Remove every vector whose payload carries the given `source_file_id`.
    async fn delete_by_source_file(&self, file_id: &str) -> Result<(), QdrantError>;

    /// Report collection statistics, doubling as a reachability probe.
    async fn describe(&self) -> Result<IndexStats, QdrantError>;
}
