//! Building blocks of the `datasync-node` binary.

use anyhow::{Context, Result};
use datasync_model::DatasetDescriptor;
use datasync_store::{DatasetRegistration, DatasetRegistry};
use datasync_sync::codec::{read_frame, write_frame};
use datasync_sync::{PeerTable, SyncCoordinator};
use datasync_types::PeerId;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// A dataset type named on the command line, as `name` or `name=priority`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetArg {
    pub name: String,
    pub priority: i32,
}

impl FromStr for DatasetArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, priority) = match s.split_once('=') {
            Some((name, priority)) => {
                let priority = priority
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid priority in {s:?}: {e}"))?;
                (name.trim(), priority)
            }
            None => (s.trim(), datasync_model::DEFAULT_PRIORITY),
        };
        if name.is_empty() {
            return Err(format!("missing dataset name in {s:?}"));
        }
        Ok(Self {
            name: name.to_string(),
            priority,
        })
    }
}

/// Registers every dataset argument as a sync-enabled type of raw JSON records,
/// read from a folder of the same name.
pub fn build_registry(args: &[DatasetArg]) -> Result<Arc<DatasetRegistry>> {
    let registry = Arc::new(DatasetRegistry::new());
    for arg in args {
        let descriptor = DatasetDescriptor::new(&arg.name, &arg.name)
            .with_priority(arg.priority)
            .with_sync(true);
        registry
            .register(DatasetRegistration::<serde_json::Value>::new(descriptor).json_codec())
            .with_context(|| format!("Failed to register dataset type {}", arg.name))?;
    }
    Ok(registry)
}

/// Runs one peer connection until the stream closes.
///
/// Outbound chunks queued for `peer` are written by a background task;
/// inbound frames are fed to the coordinator. The peer is removed from
/// `peers` when the connection ends.
pub async fn run_connection<S>(
    stream: S,
    peer: PeerId,
    peers: Arc<PeerTable>,
    coordinator: Arc<SyncCoordinator>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut outbound = peers.connect(peer);

    let writer_task = tokio::spawn(async move {
        while let Some(chunk) = outbound.recv().await {
            if let Err(e) = write_frame(&mut writer, &chunk).await {
                warn!("Failed to write to {}: {}", peer, e);
                break;
            }
        }
    });

    info!("Peer connected: {}", peer);
    coordinator.on_peer_connected(peer);

    let result = loop {
        match read_frame(&mut reader).await {
            Ok(chunk) => {
                coordinator.handle_chunk(peer, chunk);
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    peers.disconnect(&peer);
    coordinator.on_peer_disconnected(&peer);
    writer_task.abort();
    debug!("Peer disconnected: {}", peer);
    result
}
