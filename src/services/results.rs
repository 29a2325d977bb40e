use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::models::job::JobId;
use crate::models::outcome::Outcome;

/// Job id → outcome map. Written once by the worker, polled by submitters.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record the outcome of `job_id`. A second write for the same id is
    /// rejected with [`ResultStoreError::AlreadyWritten`] and leaves the first
    /// value in place.
    async fn put(&self, job_id: &JobId, outcome: &Outcome) -> Result<(), ResultStoreError>;

    /// `Ok(None)` while the job is still pending (or its result expired).
    async fn get(&self, job_id: &JobId) -> Result<Option<Outcome>, ResultStoreError>;
}

/// Result key for `job_id` under `namespace`.
pub fn result_key(namespace: &str, job_id: &JobId) -> String {
    if namespace.is_empty() {
        job_id.to_string()
    } else {
        format!("{namespace}:{job_id}")
    }
}

/// Redis string-backed store: `SET key json NX [EX ttl]`.
pub struct RedisResultStore {
    conn: MultiplexedConnection,
    namespace: String,
    ttl: Option<Duration>,
}

impl RedisResultStore {
    pub async fn connect(
        redis_url: &str,
        namespace: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Result<Self, ResultStoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            namespace: namespace.into(),
            ttl,
        })
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn put(&self, job_id: &JobId, outcome: &Outcome) -> Result<(), ResultStoreError> {
        let key = result_key(&self.namespace, job_id);
        let payload = serde_json::to_string(outcome)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(&payload).arg("NX");
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        let mut conn = self.conn.clone();
        let written: Option<String> = cmd.query_async(&mut conn).await?;
        match written {
            Some(_) => Ok(()),
            None => Err(ResultStoreError::AlreadyWritten(*job_id)),
        }
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<Outcome>, ResultStoreError> {
        let key = result_key(&self.namespace, job_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// In-process store for tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    outcomes: RwLock<HashMap<JobId, Outcome>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.outcomes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outcomes.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, job_id: &JobId, outcome: &Outcome) -> Result<(), ResultStoreError> {
        let mut outcomes = self.outcomes.write().await;
        if outcomes.contains_key(job_id) {
            return Err(ResultStoreError::AlreadyWritten(*job_id));
        }
        outcomes.insert(*job_id, outcome.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<Outcome>, ResultStoreError> {
        Ok(self.outcomes.read().await.get(job_id).cloned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResultStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Result encoding error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Result for job {0} was already written")]
    AlreadyWritten(JobId),
}
