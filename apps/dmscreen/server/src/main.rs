use anyhow::Result;
use clap::Parser;
use dmscreen_server::{telemetry::Telemetry, Cli, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::try_from(Cli::parse())?;
    let telemetry = Telemetry::init(&config)?;
    info!(
        listen_addr = %config.listen_addr,
        public_dir = %config.public_dir.display(),
        per_connection_buffer = config.per_connection_buffer,
        "starting dmscreen relay"
    );

    dmscreen_server::run(config, telemetry.metrics_handle()).await
}
