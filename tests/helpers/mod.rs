//! Shared wiring for the in-memory pipeline and HTTP tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use reqwest::multipart;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use image_classify_queue::{
    app_state::AppState,
    models::job::ArtifactKey,
    services::{
        classifier::{ClassifyError, Classifier, Prediction},
        queue::MemoryJobQueue,
        results::MemoryResultStore,
        storage::{ArtifactStore, MemoryArtifactStore, PutOutcome, StorageError},
        submission::{PollSettings, Submitter},
        worker::{Worker, WorkerSettings},
    },
};

/// Model stand-in: a fixed label for any input except the literal bytes
/// `b"corrupt"`, which fail like a model would on a bad tensor.
pub struct StubClassifier {
    pub label: &'static str,
    pub confidence: f64,
    pub delay: Duration,
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self {
            label: "tabby_cat",
            confidence: 0.87,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, image_bytes: &[u8]) -> Result<Prediction, ClassifyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if image_bytes == b"corrupt" {
            return Err(ClassifyError::Model("cannot decode tensor".to_string()));
        }
        Ok(Prediction {
            label: self.label.to_string(),
            confidence: self.confidence,
        })
    }
}

/// In-memory queue and stores shared by a submitter and a worker.
pub struct Pipeline {
    pub artifacts: Arc<MemoryArtifactStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub results: Arc<MemoryResultStore>,
}

pub const TEST_POLL: PollSettings = PollSettings {
    poll_interval: Duration::from_millis(10),
    max_wait: Duration::from_secs(5),
};

impl Pipeline {
    pub fn new() -> Self {
        Self {
            artifacts: Arc::new(MemoryArtifactStore::new()),
            queue: Arc::new(MemoryJobQueue::new()),
            results: Arc::new(MemoryResultStore::new()),
        }
    }

    pub fn submitter(&self, settings: PollSettings) -> Submitter {
        self.submitter_with(self.artifacts.clone(), settings)
    }

    /// Submitter sharing this pipeline's queue and results but storing
    /// uploads in `artifacts`.
    pub fn submitter_with(&self, artifacts: Arc<dyn ArtifactStore>, settings: PollSettings) -> Submitter {
        Submitter::new(artifacts, self.queue.clone(), self.results.clone(), settings)
    }

    pub fn worker(&self, classifier: StubClassifier) -> Worker {
        Worker::new(
            self.queue.clone(),
            self.artifacts.clone(),
            self.results.clone(),
            Arc::new(classifier),
            WorkerSettings {
                dequeue_timeout: Duration::from_millis(20),
                idle_backoff: Duration::from_millis(5),
            },
        )
    }

    /// Run a worker in the background until the returned handle is stopped.
    pub fn spawn_worker(&self, classifier: StubClassifier) -> RunningWorker {
        let worker = self.worker(classifier);
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });
        RunningWorker { shutdown, handle }
    }

    pub fn app_state(&self, settings: PollSettings) -> AppState {
        AppState::new(self.submitter(settings), self.queue.clone())
    }

    pub fn app_state_with(&self, artifacts: Arc<dyn ArtifactStore>, settings: PollSettings) -> AppState {
        AppState::new(self.submitter_with(artifacts, settings), self.queue.clone())
    }
}

pub struct RunningWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningWorker {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("worker did not shut down")
            .expect("worker task panicked");
    }
}

/// Artifact store whose writes always fail, as on a full disk.
pub struct FailingArtifactStore;

#[async_trait]
impl ArtifactStore for FailingArtifactStore {
    async fn put(&self, _key: &ArtifactKey, _bytes: &[u8]) -> Result<PutOutcome, StorageError> {
        Err(StorageError::Io(io::Error::other("no space left on device")))
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(key.to_string()))
    }
}

/// The API router served on an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn serve(router: Router) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no local address");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Test server error");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

/// POST one file to `/model/predict` under the multipart field `field`.
pub async fn upload(
    server: &TestServer,
    field: &str,
    filename: &str,
    mime: &str,
    bytes: &[u8],
) -> reqwest::Response {
    let form = multipart::Form::new().part(
        field.to_string(),
        multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime)
            .expect("Invalid mime type"),
    );

    reqwest::Client::new()
        .post(format!("{}/model/predict", server.base_url))
        .multipart(form)
        .send()
        .await
        .expect("Upload request failed")
}
