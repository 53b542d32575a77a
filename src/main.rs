//! Change Detection Service - Main Entry Point
//!
//! Loads the change detection model once, then serves detection requests over HTTP.

use anyhow::{Context, Result};
use change_detection_service::{
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
    server,
    service::ChangeDetectionService,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("change_detection_service={}", config.level).parse()?);

    match config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Change Detection Service");
    info!(
        model_path = %config.model.model_path.display(),
        width = config.model.image_width,
        height = config.model.image_height,
        device = ?config.model.device,
        "Configuration loaded successfully"
    );

    // Initialize metrics
    let metrics = Arc::new(ServiceMetrics::new());

    // The service cannot run without a model
    let engine = InferenceEngine::new(&config).context("Failed to initialize inference engine")?;

    let service = Arc::new(
        ChangeDetectionService::new(&config, engine, metrics.clone())
            .context("Failed to create storage directories")?,
    );
    info!(
        upload_dir = %config.storage.upload_dir.display(),
        results_dir = %config.storage.results_dir.display(),
        "Storage ready"
    );

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = server::router(service, config.upload.max_upload_bytes);
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Listening for detection requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
