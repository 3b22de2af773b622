use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;

use crate::registry::DEFAULT_PER_CONNECTION_BUFFER;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub public_dir: PathBuf,
    pub per_connection_buffer: usize,
    pub shutdown_grace: Duration,
    pub otel_stdout: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "dmscreen-server",
    author,
    version,
    about = "DM screen relay: serves the host and player pages and mirrors state between them"
)]
pub struct Cli {
    /// Address to bind the HTTP and websocket listener to.
    #[arg(long, env = "DMSCREEN_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Directory served as static content.
    #[arg(long, env = "DMSCREEN_PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Frames queued per connection before a slow peer starts missing updates.
    #[arg(
        long,
        env = "DMSCREEN_PER_CONNECTION_BUFFER",
        default_value_t = DEFAULT_PER_CONNECTION_BUFFER
    )]
    pub per_connection_buffer: usize,

    /// Grace period applied during shutdown.
    #[arg(long, env = "DMSCREEN_SHUTDOWN_GRACE_SECS", default_value_t = 1)]
    pub shutdown_grace_secs: u64,

    /// Also export tracing spans to stdout through OpenTelemetry.
    #[arg(long, env = "DMSCREEN_OTEL_STDOUT")]
    pub otel_stdout: bool,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;
        Ok(ServerConfig {
            listen_addr,
            public_dir: cli.public_dir,
            per_connection_buffer: cli.per_connection_buffer,
            shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            otel_stdout: cli.otel_stdout,
        })
    }
}
