//! Document ingestion pipeline: locate, extract, chunk, embed, index, track.

/// Character-bounded chunking with boundary preference and overlap.
pub mod chunking;
/// Ingestion orchestrator and its collaborator wiring.
pub mod service;
/// Core data types and the ingestion error taxonomy.
pub mod types;

pub use service::{IngestionApi, IngestionService, PipelineLimits};
pub use types::{
    Chunk, DocumentMetadata, ExtractedDocument, FileReference, HealthSnapshot, IngestError,
    IngestOutcome,
};
