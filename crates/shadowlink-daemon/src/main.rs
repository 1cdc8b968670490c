//! Shadowlink Daemon - Main entry point
//!
//! Discovers resources on neighbouring devices, publishes local shadows for
//! them, and serves the resource tree over HTTP.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "shadowlink")]
#[command(about = "Discovery and shadowing proxy for constrained devices")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "shadowlink.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Shadowlink v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Command-line bind address wins over the file
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        port = config.discovery.port,
        seeds = config.discovery.seeds.len(),
        max_payload = config.relay.max_payload,
        "Configuration loaded"
    );

    // Build the proxy engine and shared state
    let state = state::AppState::new(config.clone()).await?;

    if args.scan_once {
        // One discovery pass, then report what was shadowed
        info!("Running single discovery scan");
        let found = state.scan().await?;
        println!("Discovered {} resources", found);
        for resource in state.resources().await {
            println!("  - {} [{}]", resource.href, resource.rt.join(", "));
        }
        for device in state.devices().await {
            let endpoints: Vec<String> = device.endpoints.iter().map(|e| e.to_string()).collect();
            println!("    device {} at {}", device.udn, endpoints.join(", "));
        }
    } else {
        // Daemon mode - periodic discovery plus the HTTP front-end
        server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await?;
    }

    Ok(())
}
