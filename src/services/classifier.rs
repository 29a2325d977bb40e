use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Top-1 label and raw confidence returned by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// The image model. Built once and owned by the worker for its lifetime.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image_bytes: &[u8]) -> Result<Prediction, ClassifyError>;
}

/// Client for an HTTP inference endpoint serving the image model.
pub struct HttpClassifier {
    http: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    image: String,
    content_type: &'a str,
    top_k: u32,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifyError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    /// Send an image to the inference endpoint and read back its top label.
    async fn classify(&self, image_bytes: &[u8]) -> Result<Prediction, ClassifyError> {
        // Reject bytes that are not a decodable image before paying for a call.
        let format = image::guess_format(image_bytes).map_err(|_| ClassifyError::UnsupportedImage)?;

        let request_body = InferenceRequest {
            image: base64::engine::general_purpose::STANDARD.encode(image_bytes),
            content_type: format.to_mime_type(),
            top_k: 1,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        let prediction: Prediction = response.json().await?;
        if prediction.label.is_empty() {
            return Err(ClassifyError::EmptyLabel);
        }
        Ok(prediction)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Bytes are not a supported image format")]
    UnsupportedImage,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model returned an empty label")]
    EmptyLabel,

    #[error("Model returned an unusable confidence: {0}")]
    InvalidConfidence(f64),

    #[error("Model failed: {0}")]
    Model(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    type Seen = Arc<Mutex<Vec<Value>>>;

    /// Local model endpoint that records request bodies and answers `reply`.
    async fn spawn_model(reply: Value) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/v1/classify",
                post(move |State(seen): State<Seen>, Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        seen.lock().await.push(body);
                        Json(reply)
                    }
                }),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}/v1/classify"), seen)
    }

    #[tokio::test]
    async fn test_classify_posts_image_and_parses_prediction() {
        let (endpoint, seen) =
            spawn_model(json!({"label": "tabby_cat", "confidence": 0.87})).await;
        let classifier = HttpClassifier::new(endpoint, Duration::from_secs(5)).unwrap();

        let prediction = classifier.classify(PNG_BYTES).await.unwrap();
        assert_eq!(
            prediction,
            Prediction {
                label: "tabby_cat".to_string(),
                confidence: 0.87,
            }
        );

        let requests = seen.lock().await;
        assert_eq!(requests.len(), 1);
        let body = &requests[0];
        assert_eq!(
            body["image"],
            base64::engine::general_purpose::STANDARD.encode(PNG_BYTES)
        );
        assert_eq!(body["content_type"], "image/png");
        assert_eq!(body["top_k"], 1);
    }

    #[tokio::test]
    async fn test_classify_rejects_empty_label() {
        let (endpoint, _seen) = spawn_model(json!({"label": "", "confidence": 0.5})).await;
        let classifier = HttpClassifier::new(endpoint, Duration::from_secs(5)).unwrap();

        let err = classifier.classify(PNG_BYTES).await.unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyLabel));
    }

    #[tokio::test]
    async fn test_rejects_non_image_bytes_without_network() {
        // Port 9 (discard) is never reached: format sniffing fails first.
        let classifier =
            HttpClassifier::new("http://127.0.0.1:9/classify", Duration::from_millis(100)).unwrap();
        let err = classifier.classify(b"plain text, not pixels").await.unwrap_err();
        assert!(matches!(err, ClassifyError::UnsupportedImage));
    }

    #[test]
    fn test_prediction_wire_format() {
        let prediction: Prediction =
            serde_json::from_str(r#"{"label":"tabby_cat","confidence":0.87}"#).unwrap();
        assert_eq!(prediction.label, "tabby_cat");
        assert_eq!(prediction.confidence, 0.87);
    }
}
