//! vblkd daemon - virtio-blk controller management over SPDK/SNAP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vblkd::{Config, Server};

#[derive(Parser, Debug)]
#[command(name = "vblkd")]
#[command(about = "Manage virtio-blk controllers emulated by SPDK/SNAP")]
struct Args {
    /// Path to config file. If omitted, uses defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control socket path. Overrides config file if specified.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// SPDK JSON-RPC socket path. Overrides config file if specified.
    #[arg(long)]
    spdk_socket: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, action = clap::ArgAction::Count)]
    v: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Only our crates get detailed logging; dependencies stay at warn.
    let filter = match args.v {
        0 => "vblkd=info,spdk_rpc=info,warn",
        1 => "vblkd=debug,spdk_rpc=debug,warn",
        2 => "vblkd=trace,spdk_rpc=trace,warn",
        _ => "vblkd=trace,spdk_rpc=trace,info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let mut config = match args.config {
        Some(ref path) => Config::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::default(),
    };

    // CLI overrides
    if let Some(socket) = args.socket {
        config.socket = socket;
    }
    if let Some(spdk_socket) = args.spdk_socket {
        config.spdk.socket = spdk_socket;
    }

    info!(
        socket = %config.socket.display(),
        spdk = %config.spdk.socket.display(),
        emulation_manager = %config.emulation.emulation_manager,
        "starting vblkd"
    );

    let server = Server::new(config);
    let listener = server.bind().with_context(|| {
        format!(
            "Failed to bind control socket: {}",
            server.config().socket.display()
        )
    })?;

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = &result {
                error!(error = %e, "control server stopped");
            }
            server.cleanup();
            result.context("Control server failed")?;
        }
        result = shutdown_signal() => {
            server.cleanup();
            result?;
        }
    }

    info!("vblkd stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to register SIGTERM handler")?;
    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("Failed to wait for Ctrl+C")?;
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
    Ok(())
}
