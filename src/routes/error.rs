use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::prediction::ErrorResponse;
use crate::services::submission::SubmitError;

/// Errors returned by route handlers, mapped onto client-visible responses.
///
/// Internal failures are logged here and answered with a generic 500 so no
/// backend detail leaks to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Invalid multipart upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message.to_string(),
                    job_id: None,
                },
            ),
            ApiError::Multipart(e) => (
                e.status(),
                ErrorResponse {
                    error: e.body_text(),
                    job_id: None,
                },
            ),
            ApiError::Submit(SubmitError::Validation(e)) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: e.to_string(),
                    job_id: None,
                },
            ),
            ApiError::Submit(SubmitError::Timeout { job_id, .. }) => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse {
                    error: "Timed out waiting for prediction, retry later".to_string(),
                    job_id: Some(job_id),
                },
            ),
            ApiError::Submit(e) => {
                tracing::error!(error = %e, "Prediction request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal server error".to_string(),
                        job_id: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
