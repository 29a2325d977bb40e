use axum::routing::get;
use image_classify_queue::{
    app_state::AppState,
    config::AppConfig,
    routes::{self, metrics::MetricsState},
    services::{
        queue::{JobQueue, RedisJobQueue},
        results::RedisResultStore,
        storage::FsArtifactStore,
        submission::{PollSettings, Submitter},
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
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

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing image classification API");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "predictions_submitted_total",
        "Total classification jobs enqueued"
    );
    metrics::describe_counter!(
        "prediction_timeouts_total",
        "Requests that gave up waiting for a result"
    );
    metrics::describe_counter!(
        "artifact_dedup_hits_total",
        "Uploads whose bytes were already stored"
    );
    metrics::describe_histogram!(
        "prediction_wait_seconds",
        "Time a request waited for its job result"
    );
    metrics::describe_gauge!("queue_depth", "Current number of pending jobs in the queue");

    tracing::info!(upload_folder = %config.upload_folder, "Opening artifact store");
    let artifacts = FsArtifactStore::open(&config.upload_folder)
        .await
        .expect("Failed to open upload folder");

    tracing::info!(queue = %config.redis_queue, "Connecting to Redis job queue");
    let queue: Arc<dyn JobQueue> = Arc::new(
        RedisJobQueue::connect(&config.redis_url, config.redis_queue.clone())
            .await
            .expect("Failed to initialize job queue"),
    );

    tracing::info!(namespace = %config.result_namespace, "Connecting to Redis result store");
    let results = RedisResultStore::connect(
        &config.redis_url,
        config.result_namespace.clone(),
        config.result_ttl(),
    )
    .await
    .expect("Failed to initialize result store");

    let submitter = Submitter::new(
        Arc::new(artifacts),
        queue.clone(),
        Arc::new(results),
        PollSettings {
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        },
    );

    let state = AppState::new(submitter, queue.clone());
    let metrics_state = MetricsState {
        handle: prometheus_handle,
        queue,
    };

    let app = routes::api_router(state, config.max_upload_bytes)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
