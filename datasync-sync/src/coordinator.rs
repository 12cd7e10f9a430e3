//! Glue between dataset stores and the chunk transport.

use crate::config::SyncConfig;
use crate::encoder::{ChunkEncoder, SendReport};
use crate::error::{SyncError, SyncResult};
use crate::protocol::Chunk;
use crate::reassembler::{Reassembler, ReceiveOutcome};
use crate::transport::{ChunkSink, Destination};
use datasync_store::{DatasetRegistry, SyncTrigger};
use datasync_types::PeerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pushes local snapshots to peers and installs snapshots received from them.
///
/// Holds no dataset state of its own: snapshots live in the registry's
/// stores and in-flight transmissions in one [`Reassembler`] per peer.
pub struct SyncCoordinator {
    registry: Arc<DatasetRegistry>,
    sink: Arc<dyn ChunkSink>,
    encoder: ChunkEncoder,
    config: SyncConfig,
    reassemblers: Mutex<HashMap<PeerId, Arc<Reassembler>>>,
}

impl SyncCoordinator {
    /// Creates a coordinator and attaches it to every store of `registry`,
    /// so local reloads of sync-enabled types are broadcast.
    pub fn new(
        registry: Arc<DatasetRegistry>,
        sink: Arc<dyn ChunkSink>,
        config: SyncConfig,
    ) -> SyncResult<Arc<Self>> {
        config.validate()?;
        let coordinator = Arc::new(Self {
            registry,
            sink,
            encoder: ChunkEncoder::new(config.max_chunk_size),
            config,
            reassemblers: Mutex::new(HashMap::new()),
        });
        let trigger: Weak<dyn SyncTrigger> = Arc::downgrade(&coordinator) as Weak<dyn SyncTrigger>;
        coordinator.registry.attach_sync(trigger);
        Ok(coordinator)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    /// Encodes the current snapshot of `dataset_type` once and sends it to
    /// every connected peer.
    pub fn broadcast(&self, dataset_type: &str) -> SyncResult<SendReport> {
        self.send(dataset_type, Destination::AllPeers)
    }

    /// Sends the current snapshot of `dataset_type` to one peer.
    pub fn send_dataset(&self, dataset_type: &str, peer: PeerId) -> SyncResult<SendReport> {
        self.send(dataset_type, Destination::Peer(peer))
    }

    fn send(&self, dataset_type: &str, destination: Destination) -> SyncResult<SendReport> {
        let dataset = self
            .registry
            .get(dataset_type)
            .ok_or_else(|| SyncError::UnknownDataset(dataset_type.to_string()))?;
        let payload = dataset.encode_snapshot()?;
        self.encoder
            .send(dataset_type, &payload, destination, self.sink.as_ref())
    }

    /// Schedules the initial push to a newly connected peer.
    ///
    /// After the settle delay, if the peer is still connected, every
    /// sync-enabled type with a non-empty snapshot is sent to it in priority
    /// order. Must be called within a tokio runtime.
    pub fn on_peer_connected(self: &Arc<Self>, peer: PeerId) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.config.peer_settle_delay).await;
            if !coordinator.sink.is_connected(&peer) {
                debug!("Peer {} left before initial sync", peer);
                return;
            }
            coordinator.send_all_to(peer);
        })
    }

    fn send_all_to(&self, peer: PeerId) -> usize {
        let mut sent = 0;
        for dataset in self.registry.ordered() {
            let descriptor = dataset.descriptor();
            if !descriptor.sync_to_peers || dataset.is_empty() {
                continue;
            }
            match self.send_dataset(&descriptor.name, peer) {
                Ok(report) if report.failed.is_empty() => sent += 1,
                Ok(_) => {}
                Err(e) => warn!("Failed to sync {} to {}: {}", descriptor.name, peer, e),
            }
        }
        info!("Initial sync to {}: {} dataset types", peer, sent);
        sent
    }

    /// Drops the in-flight sessions of a disconnected peer.
    pub fn on_peer_disconnected(&self, peer: &PeerId) {
        if self
            .reassemblers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer)
            .is_some()
        {
            debug!("Dropped sync sessions of {}", peer);
        }
    }

    /// Feeds a chunk received from `from`.
    ///
    /// A completed payload replaces the snapshot of its dataset type. An
    /// unknown type or undecodable payload is logged and reported as
    /// [`ReceiveOutcome::Abandoned`]; the current snapshot stays in place.
    pub fn handle_chunk(&self, from: PeerId, chunk: Chunk) -> ReceiveOutcome {
        let reassembler = self.reassembler_for(from);
        match reassembler.receive(chunk) {
            ReceiveOutcome::Complete(payload) => {
                let Some(dataset) = self.registry.get(&payload.dataset_type) else {
                    warn!(
                        "Received snapshot for unknown dataset type {} from {}",
                        payload.dataset_type, from
                    );
                    return ReceiveOutcome::Abandoned(format!(
                        "unknown dataset type {}",
                        payload.dataset_type
                    ));
                };
                match dataset.apply_encoded(&payload.bytes) {
                    Ok(event) => {
                        info!(
                            "Applied {} snapshot from {} ({} entries)",
                            payload.dataset_type, from, event.valid_count
                        );
                        ReceiveOutcome::Complete(payload)
                    }
                    Err(e) => {
                        error!(
                            "Failed to apply {} snapshot from {}: {}",
                            payload.dataset_type, from, e
                        );
                        ReceiveOutcome::Abandoned(e.to_string())
                    }
                }
            }
            other => other,
        }
    }

    fn reassembler_for(&self, peer: PeerId) -> Arc<Reassembler> {
        self.reassemblers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(peer)
            .or_insert_with(|| {
                Arc::new(
                    Reassembler::new(self.config.session_timeout)
                        .with_max_total_chunks(self.config.max_total_chunks),
                )
            })
            .clone()
    }

    fn reassembler_list(&self) -> Vec<Arc<Reassembler>> {
        self.reassemblers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// In-flight sessions across all peers.
    pub fn session_count(&self) -> usize {
        self.reassembler_list()
            .iter()
            .map(|r| r.session_count())
            .sum()
    }

    /// Sweeps expired sessions of every peer. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.reassembler_list()
            .iter()
            .map(|r| r.sweep_expired())
            .sum()
    }

    /// Runs [`SyncCoordinator::sweep_expired`] every `sweep_interval` until
    /// the coordinator is dropped. Must be called within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                coordinator.sweep_expired();
            }
        })
    }
}

impl SyncTrigger for SyncCoordinator {
    fn has_peers(&self) -> bool {
        !self.sink.connected_peers().is_empty()
    }

    fn dataset_published(&self, dataset_type: &str) {
        if let Err(e) = self.broadcast(dataset_type) {
            warn!("Failed to broadcast {}: {}", dataset_type, e);
        }
    }
}
