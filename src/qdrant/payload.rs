//! Helpers for constructing payloads and deterministic point identifiers.

use crate::processing::types::Chunk;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside an indexed chunk.
///
/// Every payload carries `source_file_id` and `order_index` so a file's vectors can later be
/// removed or overwritten as a unit.
pub fn build_payload(chunk: &Chunk, chunk_hash: &str) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "source_file_id".into(),
        Value::String(chunk.metadata.source_file_id.clone()),
    );
    payload.insert("order_index".into(), Value::from(chunk.order_index));
    payload.insert(
        "overlap_with_previous".into(),
        Value::from(chunk.overlap_with_previous),
    );
    payload.insert("chunk_hash".into(), Value::String(chunk_hash.to_string()));
    payload.insert("text".into(), Value::String(chunk.text.clone()));
    payload.insert(
        "mime_type".into(),
        Value::String(chunk.metadata.mime_type.clone()),
    );
    payload.insert(
        "extraction_method".into(),
        Value::String(chunk.metadata.extraction_method.as_str().to_string()),
    );
    payload.insert(
        "processed_at".into(),
        Value::String(chunk.metadata.processed_at.clone()),
    );

    if let Some(owner) = chunk
        .metadata
        .owner_id
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        payload.insert("owner_id".into(), Value::String(owner.clone()));
    }
    if let Some(name) = chunk
        .metadata
        .display_name
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        payload.insert("display_name".into(), Value::String(name.clone()));
    }
    if let Some(description) = chunk
        .metadata
        .description
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        payload.insert("description".into(), Value::String(description.clone()));
    }

    Value::Object(payload)
}

/// Deterministic point id for a chunk, derived from `(source_file_id, order_index)`.
///
/// UUIDv5 over a stable key, so re-ingesting the same file overwrites its previous chunks
/// instead of duplicating them.
pub fn chunk_point_id(source_file_id: &str, order_index: usize) -> String {
    let key = format!("{source_file_id}:{order_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionMethod;
    use crate::processing::types::DocumentMetadata;

    fn sample_chunk() -> Chunk {
        Chunk {
            text: "sample".into(),
            order_index: 3,
            overlap_with_previous: 0,
            metadata: DocumentMetadata {
                source_file_id: "file-1".into(),
                owner_id: Some("user-1".into()),
                display_name: Some("report.pdf".into()),
                description: None,
                mime_type: "application/pdf".into(),
                extraction_method: ExtractionMethod::Ocr,
                processed_at: "2025-01-01T00:00:00Z".into(),
            },
        }
    }

    #[test]
    fn point_ids_are_deterministic_and_distinct_per_chunk() {
        assert_eq!(chunk_point_id("f1", 0), chunk_point_id("f1", 0));
        assert_ne!(chunk_point_id("f1", 0), chunk_point_id("f1", 1));
        assert_ne!(chunk_point_id("f1", 0), chunk_point_id("f2", 0));
    }

    #[test]
    fn chunk_hash_is_stable() {
        let h1 = compute_chunk_hash("Hello world");
        let h2 = compute_chunk_hash("Hello world");
        assert_eq!(h1, h2);
        assert!(!h1.is_empty());
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_carries_source_file_and_order() {
        let chunk = sample_chunk();
        let payload = build_payload(&chunk, "hash123");
        assert_eq!(payload["source_file_id"], "file-1");
        assert_eq!(payload["order_index"], 3);
        assert_eq!(payload["chunk_hash"], "hash123");
        assert_eq!(payload["text"], "sample");
        assert_eq!(payload["extraction_method"], "ocr");
        assert_eq!(payload["owner_id"], "user-1");
        assert_eq!(payload["display_name"], "report.pdf");
        assert!(payload.get("description").is_none());
    }
}
