//! Sync protocol units and defaults.
//!
//! A snapshot travels as one or more [`Chunk`]s sharing a session id.
//! Single-chunk sends still get a fresh session id; ids are never reused
//! across unrelated sends.

use datasync_types::SessionId;
use std::time::Duration;

/// Largest payload carried by one chunk unless configured otherwise.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 30_000;

/// Largest chunk count a transmission may declare unless configured otherwise.
pub const DEFAULT_MAX_TOTAL_CHUNKS: u32 = 10_000;

/// Incomplete sessions older than this are dropped.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// How often incomplete sessions are swept.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Wait after a peer connects before sending it the current snapshots.
pub const DEFAULT_PEER_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// One bounded-size fragment of an encoded snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Transmission this chunk belongs to.
    pub session_id: SessionId,
    /// Position within the transmission, `0..total`.
    pub index: u32,
    /// Number of chunks in the transmission.
    pub total: u32,
    /// Name of the dataset type being carried.
    pub dataset_type: String,
    pub payload: Vec<u8>,
}

impl Chunk {
    /// Whether the whole transmission fits in this chunk.
    pub fn is_single(&self) -> bool {
        self.total == 1
    }

    /// Whether `index` is within `0..total`.
    pub fn in_bounds(&self) -> bool {
        self.index < self.total
    }
}
