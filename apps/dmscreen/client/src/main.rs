use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dmscreen_client::{
    Applied, ClientConfig, GameSystem, InitiativeEntry, ReconnectPolicy, ScreenState, SyncClient,
    SyncEvent, SyncMessage,
};
use tokio::{signal, time::timeout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dmscreen-client")]
#[command(about = "Host or player tab for the DM screen relay, from the terminal")]
struct Cli {
    /// Relay URL.
    #[arg(long, env = "DMSCREEN_URL", default_value = "ws://localhost:8080")]
    url: String,

    /// Fixed delay between reconnect attempts.
    #[arg(long, env = "DMSCREEN_RECONNECT_MS", default_value_t = 3000)]
    reconnect_ms: u64,

    /// How long one-shot host commands wait for the relay.
    #[arg(long, env = "DMSCREEN_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow the shared state like a player screen does
    Watch,

    /// Broadcast an initiative list as the host
    Initiative {
        /// Combatant as NAME:ROLL[:ICON]; repeat for each entry, in order
        #[arg(short, long = "entry", required = true)]
        entries: Vec<InitiativeEntry>,

        /// Order by roll, highest first, before sending
        #[arg(long)]
        sort: bool,
    },

    /// Announce the active game system
    Game {
        /// e.g. "D&D 5e" or "Dread Nights"
        name: String,
    },

    /// Broadcast an empty initiative list
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::new(cli.url.clone())
        .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(cli.reconnect_ms)));
    let connect_timeout = Duration::from_secs(cli.connect_timeout_secs);

    match cli.command {
        Commands::Watch => watch(config).await,
        Commands::Initiative { entries, sort } => {
            let mut host = ScreenState::new();
            for entry in entries {
                host.add_combatant(entry);
            }
            let snapshot = if sort {
                host.sort_initiative()
            } else {
                SyncMessage::initiative(host.initiative())
            };
            broadcast_once(config, connect_timeout, snapshot).await
        }
        Commands::Game { name } => {
            let mut host = ScreenState::new();
            let snapshot = host.select_game(GameSystem::from(name));
            broadcast_once(config, connect_timeout, snapshot).await
        }
        Commands::Clear => {
            let mut host = ScreenState::new();
            broadcast_once(config, connect_timeout, host.clear_initiative()).await
        }
    }
}

async fn broadcast_once(
    config: ClientConfig,
    connect_timeout: Duration,
    message: SyncMessage,
) -> Result<()> {
    let url = config.url.clone();
    let (client, _events) = SyncClient::spawn(config);

    match timeout(connect_timeout, client.wait_connected()).await {
        Ok(result) => result.context("sync client stopped before connecting")?,
        Err(_) => {
            return Err(anyhow!(
                "timed out after {}s waiting for {url} - is the relay running?",
                connect_timeout.as_secs()
            ))
        }
    }

    if !client.send(&message)? {
        return Err(anyhow!("connection to {url} dropped before the update was sent"));
    }
    info!(kind = message.tag(), "update sent");
    client.close().await;
    Ok(())
}

async fn watch(config: ClientConfig) -> Result<()> {
    let (client, mut events) = SyncClient::spawn(config);
    let mut screen = ScreenState::new();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SyncEvent::Connecting { attempt } if attempt > 1 => {
                        info!(attempt, "reconnecting");
                    }
                    SyncEvent::Connecting { .. } => {}
                    SyncEvent::Connected => info!("connected; waiting for the host"),
                    SyncEvent::Disconnected => warn!("disconnected; showing last known state"),
                    SyncEvent::Message(message) => {
                        let applied = screen.apply(message);
                        render(applied, &screen);
                    }
                }
            }
        }
    }

    client.close().await;
    Ok(())
}

fn render(applied: Applied, screen: &ScreenState) {
    match applied {
        Applied::Initiative { appended, len } => {
            if len == 0 {
                info!("initiative cleared; waiting for the host");
                return;
            }
            for (index, entry) in screen.initiative().iter().enumerate() {
                let marker = if appended && index + 1 == len { "  <- new" } else { "" };
                info!(
                    "{:>2}. {:>3}  {} [{}]{}",
                    index + 1,
                    entry.roll,
                    entry.name,
                    entry.icon_class,
                    marker
                );
            }
        }
        Applied::Game { previous } => {
            info!(from = %previous, to = %screen.game(), "game system changed");
        }
        Applied::Ignored => {}
    }
}
