use anyhow::Context;
use clap::Parser;
use dx_predictor::{
    api::{build_router, AppState},
    config::Config,
    metrics::{self, MODEL_LOADED},
    ml::DiagnosisService,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dx-predictor", version)]
#[command(about = "Diagnosis prediction HTTP server", long_about = None)]
struct Args {
    /// Bind address (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Trained artifact directory (overrides artifacts.dir)
    #[arg(short, long)]
    artifacts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.artifacts {
        config.artifacts.dir = dir;
    }

    config.observability.init_tracing();
    tracing::info!("Starting dx-predictor v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    // Artifacts must load or the server does not start
    let service = DiagnosisService::from_dir(&config.artifacts.dir).with_context(|| {
        format!(
            "failed to load model artifacts from '{}'",
            config.artifacts.dir.display()
        )
    })?;
    MODEL_LOADED.set(1.0);
    tracing::info!(
        "✅ Model features: {:?}",
        service.feature_dict().all_features
    );
    tracing::info!("✅ Diagnosis classes: {:?}", service.classes());

    let state = AppState::new(Arc::new(service))
        .with_metrics(config.observability.prometheus_enabled);
    let app = build_router(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("🚀 HTTP server listening on http://{}", addr);
    tracing::info!("   Predict: POST http://{}/predict", addr);
    tracing::info!("   Health check: http://{}/health", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
