use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::models::job::Job;
use crate::services::{deadline_after, MAX_WAIT};

/// FIFO of pending jobs shared by the API (producer) and the worker (consumer).
///
/// Removal is the commit point: there is no acknowledgement, so a job popped
/// by a worker that then crashes is lost.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job to the tail of the queue.
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError>;

    /// Pop the oldest job, waiting at most `timeout`. `Ok(None)` means nothing
    /// arrived in time.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<Job>, QueueError>;

    /// Check backend connectivity (for health checks).
    async fn health_check(&self) -> Result<(), QueueError>;

    /// Number of jobs waiting to be picked up.
    async fn depth(&self) -> Result<u64, QueueError>;
}

/// Redis list-backed queue: LPUSH on enqueue, BRPOP on dequeue.
///
/// BRPOP is atomic and exclusive, so several workers may share one list.
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    queue_key: String,
}

impl RedisJobQueue {
    pub async fn connect(redis_url: &str, queue_key: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            queue_key: queue_key.into(),
        })
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.queue_key, &payload).await?;
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Job>, QueueError> {
        // BRPOP treats 0 as "block forever".
        let timeout_secs = timeout.min(MAX_WAIT).as_secs_f64().max(0.001);
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = conn.brpop(&self.queue_key, timeout_secs).await?;

        match popped {
            Some((_, payload)) => {
                let job = serde_json::from_str(&payload).map_err(|source| QueueError::Decode {
                    payload,
                    source,
                })?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let depth: u64 = conn.llen(&self.queue_key).await?;
        Ok(depth)
    }
}

/// In-process queue for tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<VecDeque<Job>>,
    available: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        self.jobs.lock().await.push_back(job.clone());
        self.available.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Job>, QueueError> {
        let deadline = deadline_after(Instant::now(), timeout);
        loop {
            let notified = self.available.notified();
            if let Some(job) = self.jobs.lock().await.pop_front() {
                return Ok(Some(job));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.jobs.lock().await.len() as u64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(serde_json::Error),

    #[error("Malformed queue entry {payload:?}: {source}")]
    Decode {
        payload: String,
        source: serde_json::Error,
    },
}
