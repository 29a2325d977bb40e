use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::JobId;
use crate::models::prediction::{JobResultResponse, PredictResponse};
use crate::routes::error::ApiError;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// POST /model/predict: Classify an uploaded image and wait for the result.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some((filename, data));
        }
    }

    let (filename, data) = upload.ok_or(ApiError::BadRequest("No file provided"))?;

    let completed = state.submitter.classify(&data, &filename).await?;

    tracing::info!(
        job_id = %completed.job_id,
        artifact_key = %completed.artifact_key,
        success = completed.outcome.is_available(),
        "Prediction served"
    );

    Ok(Json(PredictResponse::from_outcome(
        completed.outcome,
        completed.artifact_key.to_string(),
    )))
}

/// GET /model/result/{job_id}: Look up a job whose wait timed out.
///
/// 200 once the outcome is written, 202 while it is still pending.
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<JobResultResponse>), ApiError> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid job id"))?;

    let response = match state.submitter.lookup(&job_id).await? {
        Some(outcome) => (
            StatusCode::OK,
            Json(JobResultResponse {
                job_id,
                status: "completed".to_string(),
                prediction: outcome.prediction,
                score: outcome.score,
            }),
        ),
        None => (
            StatusCode::ACCEPTED,
            Json(JobResultResponse {
                job_id,
                status: "pending".to_string(),
                prediction: None,
                score: None,
            }),
        ),
    };

    Ok(response)
}
