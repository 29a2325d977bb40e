//! HTTP surface: uploads go through a served router, lookups through `oneshot`
//!
//! Run with: cargo test --test routes_test

mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use image_classify_queue::{
    models::{
        job::JobId,
        outcome::Outcome,
        prediction::{ErrorResponse, JobResultResponse, PredictResponse},
    },
    routes,
    services::{address::address, queue::JobQueue, results::ResultStore, submission::PollSettings},
};

const MAX_UPLOAD: usize = 1024 * 1024;

fn app(pipeline: &Pipeline, settings: PollSettings) -> Router {
    routes::api_router(pipeline.app_state(settings), MAX_UPLOAD)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_predict_returns_prediction() {
    let pipeline = Pipeline::new();
    let worker = pipeline.spawn_worker(StubClassifier::default());
    let server = serve(app(&pipeline, TEST_POLL)).await;

    let response = upload(&server, "file", "cat.jpg", "image/jpeg", b"cat pixels").await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: PredictResponse = response.json().await.unwrap();
    assert_eq!(
        body,
        PredictResponse {
            success: true,
            prediction: Some("tabby_cat".to_string()),
            score: Some(0.87),
            image_file_name: address(b"cat pixels", "cat.jpg").to_string(),
        }
    );

    worker.stop().await;
}

#[tokio::test]
async fn test_predict_rejects_unsupported_type() {
    let pipeline = Pipeline::new();
    let server = serve(app(&pipeline, TEST_POLL)).await;

    let response = upload(&server, "file", "note.txt", "text/plain", b"hello").await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("not supported"));
    assert!(pipeline.artifacts.is_empty().await);
    assert_eq!(pipeline.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_predict_without_file_field() {
    let pipeline = Pipeline::new();
    let server = serve(app(&pipeline, TEST_POLL)).await;

    let response = upload(&server, "attachment", "cat.jpg", "image/jpeg", b"cat pixels").await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(pipeline.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_predict_timeout_is_gateway_timeout() {
    let pipeline = Pipeline::new();
    let settings = PollSettings {
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(50),
    };
    let server = serve(app(&pipeline, settings)).await;

    let response = upload(&server, "file", "cat.jpg", "image/jpeg", b"cat pixels").await;

    assert_eq!(response.status(), reqwest::StatusCode::GATEWAY_TIMEOUT);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.job_id.is_some());
}

#[tokio::test]
async fn test_predict_storage_failure_is_internal_error() {
    let pipeline = Pipeline::new();
    let state = pipeline.app_state_with(Arc::new(FailingArtifactStore), TEST_POLL);
    let server = serve(routes::api_router(state, MAX_UPLOAD)).await;

    let response = upload(&server, "file", "cat.jpg", "image/jpeg", b"cat pixels").await;

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error, "Internal server error");
    assert_eq!(body.job_id, None);
    assert_eq!(pipeline.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_result_lookup_pending_then_completed() {
    let pipeline = Pipeline::new();
    let job_id = JobId::new();

    let pending = app(&pipeline, TEST_POLL)
        .oneshot(
            Request::builder()
                .uri(format!("/model/result/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(pending.status(), StatusCode::ACCEPTED);
    let body: JobResultResponse = json_body(pending).await;
    assert_eq!(body.status, "pending");

    pipeline
        .results
        .put(&job_id, &Outcome::predicted("tabby_cat", 0.87).unwrap())
        .await
        .unwrap();

    let completed = app(&pipeline, TEST_POLL)
        .oneshot(
            Request::builder()
                .uri(format!("/model/result/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(completed.status(), StatusCode::OK);
    let body: JobResultResponse = json_body(completed).await;
    assert_eq!(body.job_id, job_id);
    assert_eq!(body.status, "completed");
    assert_eq!(body.prediction.as_deref(), Some("tabby_cat"));
    assert_eq!(body.score, Some(0.87));
}

#[tokio::test]
async fn test_result_lookup_rejects_bad_id() {
    let pipeline = Pipeline::new();

    let response = app(&pipeline, TEST_POLL)
        .oneshot(
            Request::builder()
                .uri("/model/result/not-a-job")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_queue() {
    let pipeline = Pipeline::new();

    let response = app(&pipeline, TEST_POLL)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["queue"]["pending_jobs"], 0);
}
