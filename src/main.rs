use anyhow::Context;
use metadata_discovery::{
    api::{build_router, AppState},
    config::Config,
    scheduler::{init_scheduler_metrics, sync_job, SchedulerService},
    DiscoveryService,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting metadata discovery service v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        let registered = metadata_discovery::metrics::init_metrics()
            .and_then(|_| init_scheduler_metrics());
        match registered {
            Ok(()) => tracing::info!("Prometheus metrics initialized"),
            Err(e) => tracing::warn!(error = %e, "Failed to initialize metrics, continuing without"),
        }
    }

    let service = Arc::new(
        DiscoveryService::from_config(config.clone())
            .await
            .context("failed to build discovery service")?,
    );

    let recovered = service.start().await.context("failed to recover indices")?;
    tracing::info!(indices = ?recovered, "Index recovery finished");

    let mut scheduler = SchedulerService::new().await?;
    if config.sync.enabled {
        scheduler
            .add_job(sync_job(service.sync_service().clone()))
            .await?;
        scheduler.start().await?;
    } else {
        tracing::info!("Periodic sync disabled in configuration");
    }

    let app = build_router(AppState::new(service.clone()));
    let http_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {}", http_addr))?;

    tracing::info!("HTTP API listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Search: http://{}/v1/search?q=...", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    scheduler.shutdown().await?;
    tracing::info!("Shut down gracefully");
    Ok(())
}
