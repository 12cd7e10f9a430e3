//! Error types for the dataset store.

use datasync_model::CodecError;
use datasync_types::DocumentId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Registration-time misconfiguration. Fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No codec was supplied for the dataset type.
    #[error("dataset {0} has no codec")]
    MissingCodec(String),

    /// The descriptor is unusable.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The name is taken by a registration with other metadata or record type.
    #[error("dataset {name} already registered: {reason}")]
    Conflict { name: String, reason: String },
}

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// `by_cache_key` on a type registered with the cache disabled.
    #[error("cache is disabled for dataset {0}")]
    CacheDisabled(String),

    #[error("failed to encode {id}: {source}")]
    Encode {
        id: DocumentId,
        source: CodecError,
    },

    #[error("failed to decode {id}: {source}")]
    Decode { id: String, source: CodecError },

    /// A serialized snapshot did not have the expected shape.
    #[error("malformed snapshot payload: {0}")]
    MalformedSnapshot(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
