use serde::{Deserialize, Serialize};

/// Decimal places kept on a confidence score before it is persisted.
pub const SCORE_PRECISION: i32 = 4;

/// Terminal result record for a job, stored under the job id.
///
/// Both fields are `None` when the worker could not find the image or the
/// model failed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub prediction: Option<String>,
    pub score: Option<f64>,
}

impl Outcome {
    /// Build a completed outcome. The score is clamped to `[0, 1]` and rounded
    /// to [`SCORE_PRECISION`] places; a non-finite score yields `None`.
    pub fn predicted(label: impl Into<String>, confidence: f64) -> Option<Self> {
        let score = round_score(confidence)?;
        Some(Self {
            prediction: Some(label.into()),
            score: Some(score),
        })
    }

    pub fn unavailable() -> Self {
        Self {
            prediction: None,
            score: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.prediction.is_some() && self.score.is_some()
    }
}

/// Clamp a confidence into `[0, 1]` and round it to [`SCORE_PRECISION`] places.
pub fn round_score(confidence: f64) -> Option<f64> {
    if !confidence.is_finite() {
        return None;
    }
    let factor = 10f64.powi(SCORE_PRECISION);
    Some((confidence.clamp(0.0, 1.0) * factor).round() / factor)
}
