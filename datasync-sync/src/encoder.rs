//! Splits encoded snapshots into chunks.

use crate::error::{SyncError, SyncResult};
use crate::protocol::Chunk;
use crate::transport::{ChunkSink, Destination};
use datasync_types::{PeerId, SessionId};
use tracing::{debug, info, warn};

/// Outcome of one [`ChunkEncoder::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub session_id: SessionId,
    /// Chunks per peer.
    pub chunk_count: usize,
    /// Peers that accepted every chunk.
    pub delivered: Vec<PeerId>,
    /// Peers for which at least one send failed.
    pub failed: Vec<PeerId>,
}

/// Splits payloads into chunks of at most `max_chunk_size` bytes.
#[derive(Debug, Clone)]
pub struct ChunkEncoder {
    max_chunk_size: usize,
}

impl ChunkEncoder {
    /// A `max_chunk_size` of zero is treated as one.
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Splits `payload` into contiguous chunks sharing a fresh session id.
    ///
    /// An empty payload still yields one (empty) chunk.
    pub fn split(&self, dataset_type: &str, payload: &[u8]) -> SyncResult<Vec<Chunk>> {
        let session_id = SessionId::new();

        if payload.len() <= self.max_chunk_size {
            return Ok(vec![Chunk {
                session_id,
                index: 0,
                total: 1,
                dataset_type: dataset_type.to_string(),
                payload: payload.to_vec(),
            }]);
        }

        let slices: Vec<&[u8]> = payload.chunks(self.max_chunk_size).collect();
        let total = u32::try_from(slices.len()).map_err(|_| {
            SyncError::Protocol(format!(
                "payload of {} bytes needs too many chunks",
                payload.len()
            ))
        })?;

        Ok(slices
            .into_iter()
            .zip(0..total)
            .map(|(slice, index)| Chunk {
                session_id,
                index,
                total,
                dataset_type: dataset_type.to_string(),
                payload: slice.to_vec(),
            })
            .collect())
    }

    /// Splits `payload` once and hands the chunks to every destination peer.
    ///
    /// Sends are fire-and-forget: a failing peer is logged and reported,
    /// never retried, and does not stop delivery to the others.
    pub fn send(
        &self,
        dataset_type: &str,
        payload: &[u8],
        destination: Destination,
        sink: &dyn ChunkSink,
    ) -> SyncResult<SendReport> {
        let chunks = self.split(dataset_type, payload)?;
        let peers = match destination {
            Destination::AllPeers => sink.connected_peers(),
            Destination::Peer(peer) => vec![peer],
        };

        let mut report = SendReport {
            session_id: chunks[0].session_id,
            chunk_count: chunks.len(),
            delivered: Vec::with_capacity(peers.len()),
            failed: Vec::new(),
        };

        for peer in peers {
            let mut ok = true;
            for chunk in &chunks {
                if let Err(e) = sink.send(&peer, chunk.clone()) {
                    warn!(
                        "Failed to send {} chunk {}/{} to {}: {}",
                        dataset_type,
                        chunk.index + 1,
                        chunk.total,
                        peer,
                        e
                    );
                    ok = false;
                    break;
                }
            }
            if ok {
                debug!("Sent {} chunks of {} to {}", chunks.len(), dataset_type, peer);
                report.delivered.push(peer);
            } else {
                report.failed.push(peer);
            }
        }

        info!(
            "Sent {} ({} bytes, {} chunks) to {} peers",
            dataset_type,
            payload.len(),
            report.chunk_count,
            report.delivered.len()
        );
        Ok(report)
    }
}
