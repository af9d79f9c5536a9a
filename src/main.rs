//! Relay Hub — rendezvous and command relay for remote control.
//!
//! Devices and controllers both connect to the hub over WebSocket. Devices
//! register themselves, controllers receive the device roster, select one
//! device, and send it commands through the hub.
//!
//! Usage:
//!   relay-hub                              # Listen on 0.0.0.0:8080 (or $PORT)
//!   relay-hub --port 9000                  # Custom port
//!   relay-hub --hostname 127.0.0.1 --cors  # Local only, allow browser origins
//!   relay-hub --log-file                   # Log to ~/.relay-hub/logs/hub.log

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use relay_server::{Hub, RelayEngine, Registry};
use relay_transport::{TransportConfig, TransportServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-hub", about = "Relay Hub: rendezvous and command relay for remote control")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "0.0.0.0")]
    hostname: String,

    /// Path of the WebSocket endpoint
    #[arg(long, default_value = "/ws")]
    ws_path: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "256")]
    max_connections: usize,

    /// Allow cross-origin requests from any origin
    #[arg(long)]
    cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Write logs to a file (defaults to ~/.relay-hub/logs/hub.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

fn init_tracing(cli: &Cli) -> Result<Option<PathBuf>, std::io::Error> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let Some(ref log_file_arg) = cli.log_file else {
        if cli.json_logs {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        return Ok(None);
    };

    let log_path = if log_file_arg == "DEFAULT" {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(&home).join(".relay-hub/logs/hub.log")
    } else {
        PathBuf::from(log_file_arg)
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let writer = std::sync::Mutex::new(file);

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(writer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
    }
    Ok(Some(log_path))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match init_tracing(&cli) {
        Ok(Some(path)) => eprintln!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    }

    // One registry per process, owned by the hub task.
    let (hub, hub_task) = Hub::spawn(RelayEngine::new(Registry::new()));

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        ws_path: cli.ws_path.clone(),
        enable_cors: cli.cors,
        max_connections: Some(cli.max_connections),
        verbose_logging: cli.verbose,
    };

    let mut transport = match TransportServer::start(transport_config, Arc::new(hub)).await {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("  Relay Hub running");
    println!("    ws://{}:{}{}", cli.hostname, transport.port(), cli.ws_path);
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
    }

    info!("Shutting down...");
    transport.stop().await;
    // Open connections still hold the hub; don't wait on them.
    hub_task.abort();
    info!("Server stopped.");
}
