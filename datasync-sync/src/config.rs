//! Sync tuning knobs and their validation.

use crate::codec::MAX_PAYLOAD_SIZE;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_TOTAL_CHUNKS, DEFAULT_PEER_SETTLE_DELAY,
    DEFAULT_SESSION_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
};
use std::time::Duration;

/// Configuration for chunked sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Largest payload per chunk, in bytes.
    pub max_chunk_size: usize,
    /// Largest chunk count an incoming transmission may declare.
    pub max_total_chunks: u32,
    /// Age after which an incomplete session is dropped.
    pub session_timeout: Duration,
    /// Interval between garbage-collection sweeps.
    pub sweep_interval: Duration,
    /// Delay between a peer connecting and the initial snapshot push.
    pub peer_settle_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_total_chunks: DEFAULT_MAX_TOTAL_CHUNKS,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            peer_settle_delay: DEFAULT_PEER_SETTLE_DELAY,
        }
    }
}

impl SyncConfig {
    /// Checks that the configuration can be used to run sync.
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_chunk_size == 0 {
            return Err(SyncError::Config("max_chunk_size must be positive".into()));
        }
        if self.max_chunk_size > MAX_PAYLOAD_SIZE {
            return Err(SyncError::Config(format!(
                "max_chunk_size {} exceeds the frame limit of {MAX_PAYLOAD_SIZE} bytes",
                self.max_chunk_size
            )));
        }
        if self.max_total_chunks == 0 {
            return Err(SyncError::Config("max_total_chunks must be positive".into()));
        }
        if self.session_timeout.is_zero() {
            return Err(SyncError::Config("session_timeout must be positive".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(SyncError::Config("sweep_interval must be positive".into()));
        }
        Ok(())
    }
}
