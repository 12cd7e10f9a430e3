//! Identifier types used throughout datasync.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespaced key of a source document, unique within one dataset type.
///
/// Rendered as `namespace:path`. The namespace may contain `[a-z0-9_.-]`,
/// the path additionally `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId {
    namespace: String,
    path: String,
}

impl DocumentId {
    /// Creates a document id from its two halves.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> crate::Result<Self> {
        let namespace = namespace.into();
        let path = path.into();
        if namespace.is_empty() || !namespace.chars().all(is_namespace_char) {
            return Err(Error::InvalidDocumentId {
                id: format!("{namespace}:{path}"),
                reason: "namespace must be non-empty [a-z0-9_.-]",
            });
        }
        if path.is_empty() || !path.chars().all(|c| is_namespace_char(c) || c == '/') {
            return Err(Error::InvalidDocumentId {
                id: format!("{namespace}:{path}"),
                reason: "path must be non-empty [a-z0-9_.-/]",
            });
        }
        Ok(Self { namespace, path })
    }

    /// Parses a `namespace:path` string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Err(Error::InvalidDocumentId {
                id: s.to_string(),
                reason: "missing ':' separator",
            }),
        }
    }

    /// The namespace half.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The path half.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Id of the `index`-th element of an array document: `path_<index>`.
    #[must_use]
    pub fn element(&self, index: usize) -> Self {
        Self {
            namespace: self.namespace.clone(),
            path: format!("{}_{index}", self.path),
        }
    }
}

fn is_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.to_string()
    }
}

/// Token identifying one chunked transmission.
/// Random (UUID v4) so unrelated sends never share a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a fresh random session token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a session id from its 16 wire bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The 16 wire bytes of this session id.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a connected remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Creates a new peer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a peer ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a peer ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
