//! datasync node
//!
//! Loads dataset documents from a directory and keeps connected peers in
//! sync with them, or mirrors the datasets of another node.
//!
//! Usage:
//!   datasync-node --data ./data --listen 0.0.0.0:7400 --dataset widget --dataset recipe=10
//!   datasync-node --connect 10.0.0.5:7400 --dataset widget --dataset recipe=10

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use anyhow::{bail, Context, Result};
use clap::Parser;
use datasync_node::{build_registry, run_connection, DatasetArg};
use datasync_store::{DatasetRegistry, DirectorySource};
use datasync_sync::protocol::DEFAULT_MAX_CHUNK_SIZE;
use datasync_sync::{PeerTable, SyncConfig, SyncCoordinator};
use datasync_types::PeerId;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "datasync-node")]
#[command(about = "Serve or mirror dataset snapshots over TCP")]
struct Args {
    /// Directory laid out as <namespace>/<dataset>/<path>.json
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Address to accept peers on
    #[arg(short, long, conflicts_with = "connect")]
    listen: Option<SocketAddr>,

    /// Address of a node to mirror
    #[arg(short, long)]
    connect: Option<SocketAddr>,

    /// Dataset type to sync, as `name` or `name=priority` (repeatable)
    #[arg(long = "dataset", required = true)]
    datasets: Vec<DatasetArg>,

    /// Seconds between reloads of the data directory (0 disables)
    #[arg(long, default_value = "0")]
    reload_interval: u64,

    /// Largest chunk payload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("datasync node starting...");
    let registry = build_registry(&args.datasets)?;
    registry.initialize();

    let peers = Arc::new(PeerTable::new());
    let config = SyncConfig {
        max_chunk_size: args.max_chunk_size,
        ..Default::default()
    };
    let coordinator = SyncCoordinator::new(registry.clone(), peers.clone(), config)
        .context("Invalid sync configuration")?;
    let _sweeper = coordinator.spawn_sweeper();

    if let Some(root) = args.data {
        let source = DirectorySource::new(root);
        registry.reload_all(&source);
        if args.reload_interval > 0 {
            spawn_reloader(registry.clone(), source, Duration::from_secs(args.reload_interval));
        }
    }

    match (args.listen, args.connect) {
        (Some(addr), _) => serve(addr, peers, coordinator).await,
        (None, Some(addr)) => mirror(addr, peers, coordinator).await,
        (None, None) => bail!("either --listen or --connect is required"),
    }
}

fn spawn_reloader(registry: Arc<DatasetRegistry>, source: DirectorySource, interval: Duration) {
    let source = Arc::new(source);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            let registry = registry.clone();
            let source = source.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || registry.reload_all(source.as_ref())).await {
                error!("Reload task failed: {}", e);
            }
        }
    });
}

async fn serve(addr: SocketAddr, peers: Arc<PeerTable>, coordinator: Arc<SyncCoordinator>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                let peer = PeerId::new();
                info!("Accepted {} as {}", remote, peer);
                let peers = peers.clone();
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    if let Err(e) = run_connection(stream, peer, peers, coordinator).await {
                        warn!("Connection to {} failed: {}", remote, e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn mirror(addr: SocketAddr, peers: Arc<PeerTable>, coordinator: Arc<SyncCoordinator>) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {addr}"))?;
    info!("Connected to {}", addr);

    tokio::select! {
        result = run_connection(stream, PeerId::new(), peers, coordinator) => {
            result.context("Connection failed")?;
            info!("Connection to {} closed", addr);
        }
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
