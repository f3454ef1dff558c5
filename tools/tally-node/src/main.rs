//! Tally node runner
//!
//! Runs the tally client on a host: binds the UDP socket, loads settings,
//! ticks the client every 100ms and takes operator commands from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tally_client::{JsonFileStore, NodeStatus, TallyClientBuilder};
use tally_core::HubAddress;
use tally_discovery::DiscoveryConfig;
use tally_transport::UdpTransport;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod console;
mod link;

use config::{FileConfig, NodeConfig, Overrides};
use link::HostLink;

/// Scheduler period
const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "tally-node")]
#[command(author, version, about = "Tally light node", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hub address (ip or ip:port); skips discovery
    #[arg(long)]
    hub: Option<HubAddress>,

    /// Device name shown on the hub
    #[arg(short, long)]
    name: Option<String>,

    /// Local UDP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Settings file (default: platform config dir)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json_logs)?;

    let file = FileConfig::load(cli.config.as_deref())?;
    let config = NodeConfig::resolve(
        file,
        Overrides {
            name: cli.name,
            hub: cli.hub,
            port: cli.port,
            settings: cli.settings,
        },
    )?;

    run(config).await
}

fn setup_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

async fn run(config: NodeConfig) -> Result<()> {
    let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let socket = UdpTransport::bind(bind).with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on {}", bind);
    info!("Settings in {}", config.settings_path.display());

    let link = HostLink::new(config.probe_addr);
    let discovery = DiscoveryConfig {
        broadcast_addr: link.broadcast_addr(config.netmask),
        ..Default::default()
    };
    info!("Discovery probes go to {}", discovery.broadcast_addr);

    let mut builder = TallyClientBuilder::new()
        .timing(config.timing.clone())
        .discovery(discovery)
        .settings(Box::new(JsonFileStore::new(config.settings_path.clone())));
    if let Some(name) = &config.name {
        builder = builder.device_name(name);
    }
    if let Some(hub) = config.hub {
        builder = builder.hub(hub);
    }
    #[cfg(feature = "mdns")]
    {
        builder = builder.lookup(Box::new(tally_discovery::MdnsLookup::new()));
    }

    let mut client = builder
        .build(socket, link, Instant::now())
        .context("Failed to start client")?;

    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(console::read_commands(tx));
    println!("Type 'help' for commands.");

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last = client.status();
    loop {
        tokio::select! {
            _ = ticker.tick() => client.tick(Instant::now()),
            Some(command) = rx.recv() => console::apply(&mut client, command, Instant::now()),
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Signal handler failed: {}", e);
                }
                info!("Shutting down");
                break;
            }
        }

        let status = client.status();
        report_changes(&last, &status);
        last = status;
    }

    Ok(())
}

/// Log what a display would change
fn report_changes(prev: &NodeStatus, next: &NodeStatus) {
    if prev.indication != next.indication {
        info!("Display: {}", next.indication.as_str());
    }
    if prev.assignment != next.assignment {
        if next.assignment.is_assigned() {
            info!("Source: {}", next.assignment.label());
        } else {
            info!("Source: unassigned");
        }
    }
    if prev.config_mode != next.config_mode && next.config_mode {
        warn!("Configuration mode: check the network and run 'config clear'");
    }
    match (&prev.admin, &next.admin) {
        (None, Some(active)) => info!("Notice: {}", active.notice.text),
        (Some(_), None) => info!("Notice cleared"),
        _ => {}
    }
}
