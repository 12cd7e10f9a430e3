//! Core type definitions for datasync.
//!
//! This crate defines the identifiers shared by the dataset store and the
//! chunked sync protocol:
//! - Document identifiers (namespaced `namespace:path` keys)
//! - Sync session tokens (random 128-bit UUID v4)
//! - Peer identifiers (UUID v7)

mod ids;

pub use ids::{DocumentId, PeerId, SessionId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid document id {id:?}: {reason}")]
    InvalidDocumentId { id: String, reason: &'static str },

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
