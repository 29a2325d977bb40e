use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::sleep;

use crate::models::job::{Job, JobId};
use crate::models::outcome::Outcome;
use crate::services::classifier::{ClassifyError, Classifier};
use crate::services::queue::{JobQueue, QueueError};
use crate::services::results::{ResultStore, ResultStoreError};
use crate::services::storage::{ArtifactStore, StorageError};

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Longest a single dequeue blocks before the loop re-checks shutdown.
    pub dequeue_timeout: Duration,
    /// Pause after an empty dequeue or a transport error.
    pub idle_backoff: Duration,
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Idle,
    Processed { job_id: JobId, outcome: Outcome },
}

/// Single consumer of the job queue.
///
/// Every dequeued job ends with exactly one outcome write attempt; a missing
/// image or a model failure is recorded as [`Outcome::unavailable`] and the
/// loop keeps going.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    artifacts: Arc<dyn ArtifactStore>,
    results: Arc<dyn ResultStore>,
    classifier: Arc<dyn Classifier>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        artifacts: Arc<dyn ArtifactStore>,
        results: Arc<dyn ResultStore>,
        classifier: Arc<dyn Classifier>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            artifacts,
            results,
            classifier,
            settings,
        }
    }

    /// Process jobs until `shutdown` flips to `true` or its sender is dropped.
    /// A job in flight at shutdown is abandoned.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Worker ready, starting job processing loop");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let step = tokio::select! {
                _ = shutdown.changed() => break,
                step = self.process_next() => step,
            };

            match step {
                Ok(Step::Processed { job_id, .. }) => {
                    tracing::debug!(job_id = %job_id, "Job processed, checking for next job");
                }
                Ok(Step::Idle) => {
                    tracing::trace!("No jobs available, sleeping");
                    if self.backoff(&mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error processing job, will retry");
                    if self.backoff(&mut shutdown).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("Worker stopped");
    }

    /// Sleep for the idle backoff. Returns `true` if shutdown was requested.
    async fn backoff(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown.changed() => true,
            _ = sleep(self.settings.idle_backoff) => false,
        }
    }

    /// Pop and process one job, if any arrives within the dequeue timeout.
    pub async fn process_next(&self) -> Result<Step, WorkerError> {
        let job = match self.queue.dequeue(self.settings.dequeue_timeout).await? {
            Some(job) => job,
            None => return Ok(Step::Idle),
        };

        tracing::info!(
            job_id = %job.id,
            artifact_key = %job.artifact_key,
            "Processing classification job"
        );

        let start = Instant::now();
        let outcome = self.evaluate(&job).await;
        metrics::histogram!("job_processing_seconds").record(start.elapsed().as_secs_f64());

        match self.results.put(&job.id, &outcome).await {
            Ok(()) => {}
            Err(ResultStoreError::AlreadyWritten(job_id)) => {
                tracing::warn!(
                    job_id = %job_id,
                    "Result already written for job, keeping the first outcome"
                );
            }
            Err(e) => return Err(e.into()),
        }

        if outcome.is_available() {
            metrics::counter!("jobs_processed_total").increment(1);
            tracing::info!(
                job_id = %job.id,
                prediction = outcome.prediction.as_deref().unwrap_or_default(),
                score = outcome.score.unwrap_or_default(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Job completed successfully"
            );
        } else {
            metrics::counter!("jobs_failed_total").increment(1);
        }

        Ok(Step::Processed {
            job_id: job.id,
            outcome,
        })
    }

    /// Turn a job into its outcome. Never fails: every problem becomes an
    /// unavailable outcome.
    async fn evaluate(&self, job: &Job) -> Outcome {
        let image_bytes = match self.artifacts.get(&job.artifact_key).await {
            Ok(bytes) => bytes,
            Err(e @ (StorageError::NotFound(_) | StorageError::InvalidKey(_))) => {
                tracing::warn!(job_id = %job.id, error = %e, "Image not found for job");
                return Outcome::unavailable();
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to read image for job");
                return Outcome::unavailable();
            }
        };

        match self.classify(image_bytes).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Job processing failed");
                Outcome::unavailable()
            }
        }
    }

    /// Run the model on its own task so a panic inside it is contained.
    async fn classify(&self, image_bytes: Vec<u8>) -> Result<Outcome, ClassifyError> {
        let classifier = Arc::clone(&self.classifier);
        let prediction = tokio::spawn(async move { classifier.classify(&image_bytes).await })
            .await
            .map_err(|e| ClassifyError::Model(e.to_string()))??;

        Outcome::predicted(prediction.label, prediction.confidence)
            .ok_or(ClassifyError::InvalidConfidence(prediction.confidence))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Result store error: {0}")]
    Results(#[from] ResultStoreError),
}
