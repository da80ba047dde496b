use std::path::PathBuf;

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{error, info};
use vlanctl::adapter;
use vlanctl::config::Config;
use vlanctl::forwarder::Forwarder;
use vlanctl::messaging::CommandRouter;

/// VLAN-aware learning-switch and inter-VLAN routing controller.
#[derive(Debug, Parser)]
#[command(name = "vlanctl", version)]
struct Args {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control-channel socket path (overrides the config file)
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to load config");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Config::load validated these already; defaults are always valid
    let subnets = match config.subnet_table() {
        Ok(subnets) => subnets,
        Err(e) => {
            error!(error = %e, "Invalid subnet table");
            std::process::exit(1);
        }
    };
    let router_mac = match config.router_mac() {
        Ok(mac) => mac,
        Err(e) => {
            error!(error = %e, "Invalid router MAC");
            std::process::exit(1);
        }
    };

    info!(subnets = subnets.len(), "Starting vlanctl controller");

    let forwarder = Forwarder::new(subnets, router_mac);
    let commands = CommandRouter::new();
    let (event_tx, event_rx) = unbounded_channel();

    let socket = args.socket.unwrap_or_else(|| config.socket.clone());
    let socket_for_cleanup = socket.clone();

    let adapter = tokio::spawn(adapter::serve(socket, event_tx, commands.clone()));
    let engine = tokio::spawn(forwarder.run(event_rx, commands));

    // Set up signal handlers
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to set up SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to set up SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = adapter => {
            if let Ok(Err(e)) = result {
                error!(error = %e, "Control-channel adapter failed");
            }
        }
    }

    engine.abort();
    let _ = std::fs::remove_file(&socket_for_cleanup);
    info!("Controller stopped");
}
