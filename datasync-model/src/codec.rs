//! Codec port: one typed record to and from a generic JSON tree.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

/// Error produced by a [`RecordCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported document structure: {0}")]
    Unsupported(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bidirectional mapping between a record and a JSON tree document.
/// Implementations must be pure.
pub trait RecordCodec<T>: Send + Sync {
    /// Encodes a record into a tree document.
    fn encode(&self, record: &T) -> Result<serde_json::Value, CodecError>;

    /// Decodes a tree document into a record.
    fn decode(&self, document: &serde_json::Value) -> Result<T, CodecError>;
}

/// Codec backed by the record's serde implementation.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> RecordCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, record: &T) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::to_value(record)?)
    }

    fn decode(&self, document: &serde_json::Value) -> Result<T, CodecError> {
        Ok(T::deserialize(document)?)
    }
}
