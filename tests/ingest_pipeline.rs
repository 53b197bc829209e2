//! End-to-end pipeline tests exercising the HTTP surface against mocked backends.
//!
//! Every collaborator is a real HTTP client pointed at one `httpmock` server; only the OCR
//! engine is stubbed because the text fixtures never reach the PDF path.

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
use ingestd::{
    api::create_router,
    config::EmbeddingProvider,
    extract::{
        ContentExtractor, QualityThresholds,
        ocr::{OcrEngine, OcrError},
    },
    embedding::HttpEmbeddingClient,
    processing::{IngestionService, PipelineLimits},
    qdrant::QdrantService,
    storage::SupabaseStorageClient,
    tracking::PostgrestTrackingClient,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct UnusedOcr;

#[async_trait::async_trait]
impl OcrEngine for UnusedOcr {
    async fn recognize_pdf(&self, _pdf_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::Recognition("no OCR in this fixture".into()))
    }
}

fn service_against(server: &MockServer) -> IngestionService {
    let timeout = Duration::from_secs(5);
    let storage = SupabaseStorageClient::new(
        format!("{}/storage/v1", server.base_url()),
        "files",
        "service-key",
        timeout,
    )
    .expect("storage client");
    let embedder = HttpEmbeddingClient::new(
        EmbeddingProvider::OpenAI,
        server.base_url(),
        Some("embed-key".to_string()),
        "text-embedding-3-small",
        timeout,
    )
    .expect("embedding client");
    let qdrant = QdrantService::new(&server.base_url(), None, "docs", timeout)
        .expect("qdrant client");
    let tracking = PostgrestTrackingClient::new(
        format!("{}/rest/v1", server.base_url()),
        "ingestion_records",
        "service-key",
        timeout,
    )
    .expect("tracking client");

    IngestionService::new(
        Box::new(storage),
        ContentExtractor::new(Box::new(UnusedOcr), QualityThresholds::default()),
        Box::new(embedder),
        Box::new(qdrant),
        Box::new(tracking),
        PipelineLimits {
            max_upload_bytes: 1024 * 1024,
            chunk_max_chars: 1024,
            chunk_overlap_chars: 200,
        },
    )
}

async fn send_json(
    app: axum::Router,
    method: Method,
    uri: &str,
    payload: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match payload {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&bytes).expect("json body");
    (status, json)
}

#[tokio::test]
async fn process_walks_fallback_path_and_writes_vectors_before_tracking() {
    let server = MockServer::start_async().await;

    // First candidate path misses; the bare file id hits.
    let owned_path = server
        .mock_async(|when, then| {
            when.method(GET).path("/storage/v1/object/files/user-1/f1");
            then.status(404).body("not found");
        })
        .await;
    let bare_path = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/storage/v1/object/files/f1")
                .header("apikey", "service-key");
            then.status(200).body("A short note about reactor safety.");
        })
        .await;

    let embeddings = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .header("authorization", "Bearer embed-key");
            then.status(200).json_body(json!({
                "data": [ { "embedding": [0.1, 0.2, 0.3, 0.4] } ]
            }));
        })
        .await;

    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/docs/points")
                .query_param("wait", "true")
                .json_body_partial(
                    json!({
                        "points": [ { "payload": { "source_file_id": "f1", "order_index": 0 } } ]
                    })
                    .to_string(),
                );
            then.status(200)
                .json_body(json!({ "status": "ok", "result": {} }));
        })
        .await;

    let tracking = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/ingestion_records")
                .query_param("on_conflict", "file_id")
                .json_body_partial(json!({ "file_id": "f1", "processed": true }).to_string());
            then.status(201);
        })
        .await;

    let app = create_router(Arc::new(service_against(&server)));
    let (status, body) = send_json(
        app,
        Method::POST,
        "/process",
        Some(json!({
            "file_id": "f1",
            "owner_id": "user-1",
            "declared_mime_type": "text/plain"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["chunks_written"], 1);

    owned_path.assert_hits_async(1).await;
    bare_path.assert_hits_async(1).await;
    embeddings.assert_hits_async(1).await;
    upsert.assert_hits_async(1).await;
    tracking.assert_hits_async(1).await;
}

#[tokio::test]
async fn storage_outage_reports_bad_gateway_and_skips_downstream_writes() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path_contains("/storage/v1/object/files/");
            then.status(503).body("storage maintenance");
        })
        .await;
    let embeddings = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({ "data": [] }));
        })
        .await;
    let tracking = server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/ingestion_records");
            then.status(201);
        })
        .await;

    let app = create_router(Arc::new(service_against(&server)));
    let (status, body) = send_json(
        app,
        Method::POST,
        "/process",
        Some(json!({ "file_id": "f1" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_kind"], "storage_unavailable");
    embeddings.assert_hits_async(0).await;
    tracking.assert_hits_async(0).await;
}

#[tokio::test]
async fn tracking_rejection_reports_inconsistency_after_vectors_landed() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/storage/v1/object/files/f1");
            then.status(200).body("tracked but unlucky");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({
                "data": [ { "embedding": [0.5, 0.5, 0.5, 0.5] } ]
            }));
        })
        .await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/docs/points");
            then.status(200)
                .json_body(json!({ "status": "ok", "result": {} }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/ingestion_records");
            then.status(500).body("relation is read-only");
        })
        .await;

    let app = create_router(Arc::new(service_against(&server)));
    let (status, body) = send_json(
        app,
        Method::POST,
        "/process",
        Some(json!({ "file_id": "f1" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_kind"], "tracking_write_failed");
    upsert.assert_hits_async(1).await;
}

#[tokio::test]
async fn delete_clears_vectors_and_downgrades_the_tracking_record() {
    let server = MockServer::start_async().await;

    let vector_delete = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/docs/points/delete")
                .json_body_partial(
                    json!({
                        "filter": {
                            "must": [ { "key": "source_file_id", "match": { "value": "f9" } } ]
                        }
                    })
                    .to_string(),
                );
            then.status(200)
                .json_body(json!({ "status": "ok", "result": {} }));
        })
        .await;
    let tracking = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/ingestion_records")
                .json_body_partial(json!({ "file_id": "f9", "processed": false }).to_string());
            then.status(201);
        })
        .await;

    let app = create_router(Arc::new(service_against(&server)));
    let (status, body) = send_json(app, Method::DELETE, "/files/f9", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["file_id"], "f9");
    vector_delete.assert_hits_async(1).await;
    tracking.assert_hits_async(1).await;
}

#[tokio::test]
async fn health_reflects_collection_stats() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/collections/docs");
            then.status(200).json_body(json!({
                "status": "ok",
                "result": { "points_count": 11, "status": "green" }
            }));
        })
        .await;

    let app = create_router(Arc::new(service_against(&server)));
    let (status, body) = send_json(app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vector_store_reachable"], true);
    assert_eq!(body["points_count"], 11);
}
