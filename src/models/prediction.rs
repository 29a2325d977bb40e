use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::outcome::Outcome;

/// Response body of `POST /model/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: Option<String>,
    pub score: Option<f64>,
    pub image_file_name: String,
}

impl PredictResponse {
    pub fn from_outcome(outcome: Outcome, image_file_name: String) -> Self {
        Self {
            success: outcome.is_available(),
            prediction: outcome.prediction,
            score: outcome.score,
            image_file_name,
        }
    }
}

/// Response body of `GET /model/result/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultResponse {
    pub job_id: JobId,
    pub status: String,
    pub prediction: Option<String>,
    pub score: Option<f64>,
}

/// Error body returned for any non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub job_id: Option<JobId>,
}
