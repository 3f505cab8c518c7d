//! Mail core entry point.

use event_store::InMemoryEventStore;
use handlers::HandlerContext;
use metrics_exporter_prometheus::PrometheusBuilder;
use server::{App, Config, LogFormat};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("SIGINT received, draining workers");
        }
        () = terminate => {
            tracing::info!("SIGTERM received, draining workers");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration and tracing
    let config = Config::from_env()?;
    init_tracing(&config);

    // 2. Prometheus exporter
    PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()?;

    // 3. Store, read models and handlers
    let app = App::new(
        HandlerContext::with_defaults(InMemoryEventStore::new()),
        &config,
    );
    app.processor.run_catch_up().await?;
    app.views.report_sizes().await;

    // 4. Background workers
    let cancel = CancellationToken::new();
    let mut workers = app.spawn_workers(&cancel);
    tracing::info!(
        metrics_addr = %config.metrics_addr,
        projections = app.processor.projection_count(),
        "mail core started"
    );

    shutdown_signal().await;
    cancel.cancel();
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "worker ended abnormally");
        }
    }

    app.views.report_sizes().await;
    tracing::info!("shut down gracefully");
    Ok(())
}
