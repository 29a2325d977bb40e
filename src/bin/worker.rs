use image_classify_queue::{
    config::AppConfig,
    services::{
        classifier::HttpClassifier,
        queue::RedisJobQueue,
        results::RedisResultStore,
        storage::FsArtifactStore,
        worker::{Worker, WorkerSettings},
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting classification worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    if let Some(addr) = &config.worker_metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        tracing::info!(%addr, "Serving worker metrics");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
    }
    metrics::describe_counter!("jobs_processed_total", "Jobs completed with a prediction");
    metrics::describe_counter!("jobs_failed_total", "Jobs completed without a prediction");
    metrics::describe_histogram!("job_processing_seconds", "Time to process one job");

    // Initialize services
    tracing::info!("Initializing services");
    let artifacts = FsArtifactStore::open(&config.upload_folder)
        .await
        .expect("Failed to open upload folder");

    let queue = RedisJobQueue::connect(&config.redis_url, config.redis_queue.clone())
        .await
        .expect("Failed to initialize job queue");

    let results = RedisResultStore::connect(
        &config.redis_url,
        config.result_namespace.clone(),
        config.result_ttl(),
    )
    .await
    .expect("Failed to initialize result store");

    // Built once, before the loop, and owned by the worker from here on.
    tracing::info!(endpoint = %config.model_url, "Loading classifier");
    let classifier = HttpClassifier::new(config.model_url.clone(), config.model_timeout())
        .expect("Failed to initialize classifier");

    let worker = Worker::new(
        Arc::new(queue),
        Arc::new(artifacts),
        Arc::new(results),
        Arc::new(classifier),
        WorkerSettings {
            dequeue_timeout: config.dequeue_timeout(),
            idle_backoff: config.idle_backoff(),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Dropping the sender would stop the worker; keep it alive instead.
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
}
