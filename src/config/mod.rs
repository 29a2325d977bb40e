use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000"). Ignored by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string shared by the job queue and result store
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Redis list holding pending jobs
    #[serde(default = "default_redis_queue")]
    pub redis_queue: String,

    /// Prefix for result keys; empty stores results under the bare job id
    #[serde(default = "default_result_namespace")]
    pub result_namespace: String,

    /// Expiry for stored results. Unset keeps them until evicted externally.
    #[serde(default)]
    pub result_ttl_secs: Option<u64>,

    /// Directory holding uploaded images, named by content address
    #[serde(default = "default_upload_folder")]
    pub upload_folder: String,

    /// Delay between result lookups while a request waits
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on how long a request waits for its result
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Worker sleep after an empty dequeue
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// How long a single blocking dequeue may wait
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,

    /// Inference endpoint called by the worker
    #[serde(default = "default_model_url")]
    pub model_url: String,

    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Address for the worker's Prometheus scrape listener. Unset disables it.
    #[serde(default)]
    pub worker_metrics_addr: Option<String>,

    /// Request body limit for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_redis_queue() -> String {
    "service_queue".to_string()
}

fn default_result_namespace() -> String {
    "result".to_string()
}

fn default_upload_folder() -> String {
    "uploads".to_string()
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_max_wait_ms() -> u64 {
    30_000
}

fn default_idle_backoff_ms() -> u64 {
    50
}

fn default_dequeue_timeout_ms() -> u64 {
    1_000
}

fn default_model_url() -> String {
    "http://127.0.0.1:8501/v1/classify".to_string()
}

fn default_model_timeout_secs() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timing settings that would make polling spin or never wait.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("POLL_INTERVAL_MS must be greater than 0"));
        }
        if self.max_wait_ms == 0 {
            return Err(ConfigError::Invalid("MAX_WAIT_MS must be greater than 0"));
        }
        if self.dequeue_timeout_ms == 0 {
            return Err(ConfigError::Invalid("DEQUEUE_TIMEOUT_MS must be greater than 0"));
        }
        if self.poll_interval_ms > self.max_wait_ms {
            return Err(ConfigError::Invalid(
                "POLL_INTERVAL_MS must not exceed MAX_WAIT_MS",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn result_ttl(&self) -> Option<Duration> {
        self.result_ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
