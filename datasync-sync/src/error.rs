//! Error types for the sync layer.

use datasync_store::StoreError;
use datasync_types::PeerId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid sync configuration.
    #[error("invalid sync configuration: {0}")]
    Config(String),

    /// Protocol error (invalid frame or chunk).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Peer is not connected.
    #[error("peer not found: {0}")]
    PeerNotFound(PeerId),

    /// Outbound channel to a peer was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// No dataset type with this name is registered.
    #[error("unknown dataset type: {0}")]
    UnknownDataset(String),

    /// Encoding or installing a snapshot failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Stream I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
