use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::models::job::{ArtifactKey, Job, JobId};
use crate::models::outcome::Outcome;
use crate::services::address::{self, ValidationError};
use crate::services::deadline_after;
use crate::services::queue::{JobQueue, QueueError};
use crate::services::results::{ResultStore, ResultStoreError};
use crate::services::storage::{ArtifactStore, PutOutcome, StorageError};

/// Floor applied to the poll interval so a misconfigured zero never spins.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default bounds used by [`Submitter::classify`].
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

/// A job that has been stored and enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub job_id: JobId,
    pub artifact_key: ArtifactKey,
}

/// A job whose outcome arrived before the deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub job_id: JobId,
    pub artifact_key: ArtifactKey,
    pub outcome: Outcome,
}

/// Producer side of the pipeline: stores an upload, enqueues a job for it and
/// waits a bounded time for the worker's outcome.
pub struct Submitter {
    artifacts: Arc<dyn ArtifactStore>,
    queue: Arc<dyn JobQueue>,
    results: Arc<dyn ResultStore>,
    settings: PollSettings,
}

impl Submitter {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        queue: Arc<dyn JobQueue>,
        results: Arc<dyn ResultStore>,
        settings: PollSettings,
    ) -> Self {
        Self {
            artifacts,
            queue,
            results,
            settings,
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Validate, store and enqueue an upload without waiting for its result.
    ///
    /// Nothing is hashed or stored for an unsupported file type, and nothing
    /// is enqueued if the image could not be stored.
    pub async fn submit(&self, bytes: &[u8], filename: &str) -> Result<Submission, SubmitError> {
        address::validate_filename(filename)?;
        let artifact_key = address::address(bytes, filename);

        match self.artifacts.put(&artifact_key, bytes).await? {
            PutOutcome::Stored => {
                tracing::debug!(artifact_key = %artifact_key, size = bytes.len(), "Stored image");
            }
            PutOutcome::AlreadyPresent => {
                metrics::counter!("artifact_dedup_hits_total").increment(1);
                tracing::debug!(artifact_key = %artifact_key, "Image already stored, skipping write");
            }
        }

        let job = Job::new(artifact_key);
        self.queue.enqueue(&job).await?;
        metrics::counter!("predictions_submitted_total").increment(1);

        tracing::info!(
            job_id = %job.id,
            artifact_key = %job.artifact_key,
            "Classification job enqueued"
        );

        Ok(Submission {
            job_id: job.id,
            artifact_key: job.artifact_key,
        })
    }

    /// Current outcome of `job_id`, if the worker has written one.
    pub async fn lookup(&self, job_id: &JobId) -> Result<Option<Outcome>, SubmitError> {
        Ok(self.results.get(job_id).await?)
    }

    /// Poll the result store for `job_id` until an outcome appears or
    /// `max_wait` elapses. The job itself is never cancelled.
    pub async fn wait_for(
        &self,
        job_id: &JobId,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Outcome, SubmitError> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let start = Instant::now();
        let deadline = deadline_after(start, max_wait);

        loop {
            if let Some(outcome) = self.results.get(job_id).await? {
                metrics::histogram!("prediction_wait_seconds").record(start.elapsed().as_secs_f64());
                return Ok(outcome);
            }

            let now = Instant::now();
            if now >= deadline {
                metrics::counter!("prediction_timeouts_total").increment(1);
                tracing::warn!(
                    job_id = %job_id,
                    waited_ms = (now - start).as_millis() as u64,
                    "Timed out waiting for job result"
                );
                return Err(SubmitError::Timeout {
                    job_id: *job_id,
                    waited: now - start,
                });
            }

            sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// Store, enqueue and wait for one upload.
    pub async fn submit_and_wait(
        &self,
        bytes: &[u8],
        filename: &str,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Completed, SubmitError> {
        let submission = self.submit(bytes, filename).await?;
        let outcome = self
            .wait_for(&submission.job_id, max_wait, poll_interval)
            .await?;

        Ok(Completed {
            job_id: submission.job_id,
            artifact_key: submission.artifact_key,
            outcome,
        })
    }

    /// [`Self::submit_and_wait`] with the configured poll settings.
    pub async fn classify(&self, bytes: &[u8], filename: &str) -> Result<Completed, SubmitError> {
        self.submit_and_wait(
            bytes,
            filename,
            self.settings.max_wait,
            self.settings.poll_interval,
        )
        .await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to store image: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to enqueue job: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to read job result: {0}")]
    Results(#[from] ResultStoreError),

    #[error("Job {job_id} did not complete within {waited:?}")]
    Timeout { job_id: JobId, waited: Duration },
}
