//! Outbound chunk delivery.
//!
//! The encoder and coordinator only see [`ChunkSink`]; how chunks reach a
//! peer (TCP stream, in-process channel, test recorder) is up to the sink.
//! Delivery is assumed ordered and reliable per peer.

use crate::error::{SyncError, SyncResult};
use crate::protocol::Chunk;
use datasync_types::PeerId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// Where a snapshot should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Every currently connected peer.
    AllPeers,
    /// One peer.
    Peer(PeerId),
}

/// Outbound send capability for chunks.
pub trait ChunkSink: Send + Sync {
    /// Peers currently connected.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Whether `peer` is currently connected.
    fn is_connected(&self, peer: &PeerId) -> bool {
        self.connected_peers().contains(peer)
    }

    /// Queues one chunk for `peer` without waiting for delivery.
    fn send(&self, peer: &PeerId, chunk: Chunk) -> SyncResult<()>;
}

/// Connected peers, each fed through an unbounded channel.
///
/// The receiving half returned by [`PeerTable::connect`] is drained by
/// whatever owns the peer's connection (usually a writer task).
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<PeerId, mpsc::UnboundedSender<Chunk>>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer and returns the receiver of its outbound chunks.
    /// Connecting an already known peer replaces its channel.
    pub fn connect(&self, peer: PeerId) -> mpsc::UnboundedReceiver<Chunk> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer, tx);
        debug!("Peer connected: {}", peer);
        rx
    }

    /// Removes a peer. Returns whether it was connected.
    pub fn disconnect(&self, peer: &PeerId) -> bool {
        let removed = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer)
            .is_some();
        if removed {
            debug!("Peer disconnected: {}", peer);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkSink for PeerTable {
    fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        peers.sort();
        peers
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(peer)
    }

    fn send(&self, peer: &PeerId, chunk: Chunk) -> SyncResult<()> {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        let tx = peers.get(peer).ok_or(SyncError::PeerNotFound(*peer))?;
        tx.send(chunk).map_err(|_| SyncError::ChannelClosed)
    }
}

/// A recording sink for testing.
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every sent chunk instead of delivering it.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        peers: Mutex<Vec<PeerId>>,
        failing: Mutex<HashSet<PeerId>>,
        sent: Mutex<Vec<(PeerId, Chunk)>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a sink with the given peers connected.
        pub fn with_peers(peers: impl IntoIterator<Item = PeerId>) -> Self {
            let sink = Self::new();
            for peer in peers {
                sink.add_peer(peer);
            }
            sink
        }

        pub fn add_peer(&self, peer: PeerId) {
            let mut peers = self.peers.lock().unwrap();
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }

        pub fn remove_peer(&self, peer: &PeerId) {
            self.peers.lock().unwrap().retain(|p| p != peer);
        }

        /// Makes every send to `peer` fail.
        pub fn fail_sends_to(&self, peer: PeerId) {
            self.failing.lock().unwrap().insert(peer);
        }

        /// Everything sent so far, in send order.
        pub fn sent(&self) -> Vec<(PeerId, Chunk)> {
            self.sent.lock().unwrap().clone()
        }

        /// Chunks sent to one peer, in send order.
        pub fn sent_to(&self, peer: &PeerId) -> Vec<Chunk> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| p == peer)
                .map(|(_, c)| c.clone())
                .collect()
        }

        /// Drains the record.
        pub fn take_sent(&self) -> Vec<(PeerId, Chunk)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl ChunkSink for RecordingSink {
        fn connected_peers(&self) -> Vec<PeerId> {
            self.peers.lock().unwrap().clone()
        }

        fn send(&self, peer: &PeerId, chunk: Chunk) -> SyncResult<()> {
            if self.failing.lock().unwrap().contains(peer) {
                return Err(SyncError::ChannelClosed);
            }
            if !self.peers.lock().unwrap().contains(peer) {
                return Err(SyncError::PeerNotFound(*peer));
            }
            self.sent.lock().unwrap().push((*peer, chunk));
            Ok(())
        }
    }
}
