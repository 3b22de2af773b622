pub mod config;
pub mod netinfo;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::{future::Future, sync::Arc};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

pub use config::{Cli, ServerConfig};
pub use netinfo::{InterfaceSource, SystemInterfaces};
pub use registry::{ConnectionRegistry, RegistryStats};
pub use routes::build_router;
pub use state::AppState;

pub async fn run(config: ServerConfig, metrics: PrometheusHandle) -> Result<()> {
    if !config.public_dir.is_dir() {
        warn!(
            public_dir = %config.public_dir.display(),
            "public directory not found; static pages will 404"
        );
    }

    let state = Arc::new(AppState::new(
        ConnectionRegistry::new(config.per_connection_buffer),
        config.public_dir.clone(),
        Arc::new(SystemInterfaces),
        metrics,
    ));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listener")?;

    let port = config.listen_addr.port();
    info!("dmscreen listening on {}", config.listen_addr);
    info!("host screen: http://localhost:{port}");
    let lan = state.local_address();
    if lan != netinfo::LOCALHOST {
        info!("player view: http://{lan}:{port}/player");
    }

    serve(listener, state, shutdown_signal()).await?;

    info!(
        grace_seconds = config.shutdown_grace.as_secs(),
        "shutdown signal received; sleeping for graceful period"
    );
    tokio::time::sleep(config.shutdown_grace).await;
    info!("graceful shutdown complete");

    Ok(())
}

/// Serves the router on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server shutdown with error")
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
