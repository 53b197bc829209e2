//! HTTP surface for the ingestion service.
//!
//! A compact Axum router with four endpoints:
//!
//! - `POST /process` – Run the full ingestion pipeline for one uploaded file: locate the blob,
//!   extract text, chunk, embed, upsert vectors, and record tracking state.
//! - `DELETE /files/{file_id}` – Remove a file's vectors and mark its tracking record
//!   unprocessed.
//! - `GET /health` – Vector store reachability probe.
//! - `GET /metrics` – Ingestion counters for observability dashboards.
//!
//! Failures always surface as `{success: false, file_id, error_kind, message}` with a status
//! class matching the error taxonomy; callers never see a partial success.

use crate::processing::{FileReference, IngestError, IngestionApi};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Serialize;
use std::sync::Arc;

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IngestionApi + 'static,
{
    Router::new()
        .route("/process", post(process_file::<S>))
        .route("/files/:file_id", delete(delete_file::<S>))
        .route("/health", get(get_health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Success response for the `POST /process` endpoint.
#[derive(Serialize)]
struct ProcessResponse {
    success: bool,
    file_id: String,
    chunks_written: usize,
}

/// Ingest a file named by the request payload.
///
/// The extractor rejection is mapped by hand so a malformed or incomplete body still gets
/// the structured failure envelope instead of axum's plain-text 422.
async fn process_file<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<FileReference>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError>
where
    S: IngestionApi,
{
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(String::new(), IngestError::BadRequest(rejection.body_text()))
    })?;
    let file_id = request.file_id.clone();
    let outcome = service
        .process_file(request)
        .await
        .map_err(|error| ApiError::new(file_id.clone(), error))?;
    tracing::info!(
        file_id = %file_id,
        chunks = outcome.chunks_written,
        "Process request completed"
    );
    Ok(Json(ProcessResponse {
        success: true,
        file_id,
        chunks_written: outcome.chunks_written,
    }))
}

/// Success response for the `DELETE /files/{file_id}` endpoint.
#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    file_id: String,
}

/// Remove a previously ingested file from the index.
async fn delete_file<S>(
    State(service): State<Arc<S>>,
    Path(file_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError>
where
    S: IngestionApi,
{
    service
        .delete_file(&file_id)
        .await
        .map_err(|error| ApiError::new(file_id.clone(), error))?;
    Ok(Json(DeleteResponse {
        success: true,
        file_id,
    }))
}

/// Report vector store reachability.
async fn get_health<S>(State(service): State<Arc<S>>) -> Response
where
    S: IngestionApi,
{
    let snapshot = service.health().await;
    let status = if snapshot.vector_store_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(snapshot)).into_response()
}

/// Return a concise metrics snapshot with ingestion counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: IngestionApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Failure response body shared by all endpoints.
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    file_id: String,
    error_kind: &'static str,
    message: String,
}

struct ApiError {
    file_id: String,
    error: IngestError,
}

impl ApiError {
    fn new(file_id: String, error: IngestError) -> Self {
        Self { file_id, error }
    }
}

/// Map an error kind to its HTTP status class: client-caused → 4xx, not-found → 404,
/// transient server-side → 502, inconsistency and catch-all → 500.
fn status_for(error: &IngestError) -> StatusCode {
    match error {
        IngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
        IngestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        IngestError::UnsupportedMimeType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        IngestError::UnsupportedEncoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::NotFound { .. } => StatusCode::NOT_FOUND,
        IngestError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::StorageUnavailable(_)
        | IngestError::EmbeddingFailed(_)
        | IngestError::VectorStoreWriteFailed(_) => StatusCode::BAD_GATEWAY,
        IngestError::TrackingWriteFailed(_) | IngestError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        if matches!(self.error, IngestError::Unexpected(_)) {
            tracing::error!(file_id = %self.file_id, error = %self.error, "Unexpected ingestion failure");
        } else {
            tracing::warn!(file_id = %self.file_id, kind = self.error.kind(), error = %self.error, "Ingestion failed");
        }
        let body = ErrorBody {
            success: false,
            file_id: self.file_id,
            error_kind: self.error.kind(),
            message: self.error.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        FileReference, HealthSnapshot, IngestError, IngestOutcome, IngestionApi,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubService {
        outcome: Option<IngestOutcome>,
        error_kind: Option<&'static str>,
        calls: Mutex<Vec<FileReference>>,
        deletes: Mutex<Vec<String>>,
    }

    impl StubService {
        fn succeeding(chunks_written: usize) -> Self {
            Self {
                outcome: Some(IngestOutcome { chunks_written }),
                ..Self::default()
            }
        }

        fn failing(kind: &'static str) -> Self {
            Self {
                error_kind: Some(kind),
                ..Self::default()
            }
        }

        fn error_for(kind: &str, file_id: &str) -> IngestError {
            match kind {
                "payload_too_large" => IngestError::PayloadTooLarge {
                    size: 99,
                    limit: 10,
                },
                "not_found" => IngestError::NotFound {
                    file_id: file_id.to_string(),
                },
                "storage_unavailable" => IngestError::StorageUnavailable("down".into()),
                "tracking_write_failed" => IngestError::TrackingWriteFailed("down".into()),
                other => IngestError::Unexpected(other.to_string()),
            }
        }
    }

    #[async_trait]
    impl IngestionApi for StubService {
        async fn process_file(
            &self,
            request: FileReference,
        ) -> Result<IngestOutcome, IngestError> {
            let file_id = request.file_id.clone();
            self.calls.lock().await.push(request);
            match (self.outcome, self.error_kind) {
                (Some(outcome), None) => Ok(outcome),
                (_, Some(kind)) => Err(Self::error_for(kind, &file_id)),
                _ => Err(IngestError::Unexpected("unconfigured stub".into())),
            }
        }

        async fn delete_file(&self, file_id: &str) -> Result<(), IngestError> {
            self.deletes.lock().await.push(file_id.to_string());
            match self.error_kind {
                None => Ok(()),
                Some(kind) => Err(Self::error_for(kind, file_id)),
            }
        }

        async fn health(&self) -> HealthSnapshot {
            HealthSnapshot {
                vector_store_reachable: true,
                points_count: Some(7),
                error: None,
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                files_processed: 3,
                chunks_indexed: 12,
                files_deleted: 1,
            }
        }
    }

    async fn post_process(
        service: Arc<StubService>,
        payload: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let app = create_router(service);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/process")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).expect("json body");
        (status, json)
    }

    #[tokio::test]
    async fn process_route_returns_chunk_count_and_forwards_fields() {
        let service = Arc::new(StubService::succeeding(5));
        let payload = json!({
            "file_id": "f-42",
            "owner_id": "user-9",
            "storage_path_hint": "user-9/f-42",
            "declared_mime_type": "application/pdf",
            "declared_size_bytes": 1234
        });
        let (status, body) = post_process(service.clone(), payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["file_id"], "f-42");
        assert_eq!(body["chunks_written"], 5);

        let calls = service.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].owner_id.as_deref(), Some("user-9"));
        assert_eq!(calls[0].storage_path_hint.as_deref(), Some("user-9/f-42"));
        assert_eq!(calls[0].declared_size_bytes, Some(1234));
    }

    #[tokio::test]
    async fn body_missing_file_id_is_a_structured_bad_request() {
        let service = Arc::new(StubService::succeeding(1));
        let (status, body) = post_process(service.clone(), json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_kind"], "bad_request");
        assert!(body["message"].as_str().expect("message").contains("file_id"));
        assert!(service.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn payload_too_large_maps_to_413_with_error_kind() {
        let service = Arc::new(StubService::failing("payload_too_large"));
        let (status, body) = post_process(service, json!({ "file_id": "f-1" })).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
        assert_eq!(body["file_id"], "f-1");
        assert_eq!(body["error_kind"], "payload_too_large");
        assert!(body["message"].as_str().expect("message").contains("99"));
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let service = Arc::new(StubService::failing("not_found"));
        let (status, body) = post_process(service, json!({ "file_id": "f-1" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_kind"], "not_found");
    }

    #[tokio::test]
    async fn transient_storage_failure_maps_to_502() {
        let service = Arc::new(StubService::failing("storage_unavailable"));
        let (status, body) = post_process(service, json!({ "file_id": "f-1" })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error_kind"], "storage_unavailable");
    }

    #[tokio::test]
    async fn tracking_inconsistency_maps_to_500() {
        let service = Arc::new(StubService::failing("tracking_write_failed"));
        let (status, body) = post_process(service, json!({ "file_id": "f-1" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_kind"], "tracking_write_failed");
    }

    #[tokio::test]
    async fn delete_route_targets_the_path_file_id() {
        let service = Arc::new(StubService::succeeding(0));
        let app = create_router(service.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/files/f-7")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(service.deletes.lock().await.clone(), vec!["f-7".to_string()]);
    }

    #[tokio::test]
    async fn health_and_metrics_report_snapshots() {
        let service = Arc::new(StubService::succeeding(0));
        let app = create_router(service.clone());

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);

        let metrics = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("metrics response");
        let body = to_bytes(metrics.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["files_processed"], 3);
        assert_eq!(json["chunks_indexed"], 12);
    }
}
