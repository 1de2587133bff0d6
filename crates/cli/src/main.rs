//! tsync command-line entry point.
//!
//! Drives the offline sync engine against a real origin: install and
//! activate the caches, send requests through the interceptor, replay the
//! pending queue and manage the offline library.
//! Logging goes to stderr so command output on stdout stays machine-readable.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tsync_client::{ConnectivityMonitor, HttpTransport, TransportConfig};
use tsync_core::AppConfig;
use tsync_engine::{Collaborators, Engine, PageRegistry};

mod commands;

/// tsync - offline-first request interception and sync
#[derive(Parser, Debug)]
#[command(name = "tsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Treat the network as unreachable
    #[arg(long, global = true, env = "TSYNC_OFFLINE")]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    let transport = HttpTransport::new(TransportConfig::from_app(&config)?)?;
    let collaborators = Collaborators {
        transport: Arc::new(transport),
        connectivity: Arc::new(ConnectivityMonitor::new(!cli.offline)),
        clients: Arc::new(PageRegistry::new()),
    };
    let engine = Engine::open(config, collaborators)
        .await
        .context("failed to open engine")?;

    tracing::debug!(command = ?cli.command, offline = cli.offline, "running");
    commands::run(&engine, cli.command).await
}
