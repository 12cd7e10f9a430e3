//! Dataset type descriptors.

use serde::{Deserialize, Serialize};

/// Priority given to dataset types that do not declare one.
pub const DEFAULT_PRIORITY: i32 = 1000;

/// Describes one dataset type. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Stable tag; also the dataset type name carried on the wire.
    pub name: String,
    /// Folder (category) the documents are discovered under.
    pub folder: String,
    /// Optional prefix placed in front of `folder` (e.g. `mymod/recipes`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_namespace: Option<String>,
    /// Whether snapshots are pushed to remote peers.
    #[serde(default)]
    pub sync_to_peers: bool,
    /// Lower loads and initializes earlier.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Whether one document may hold an array of records.
    #[serde(default)]
    pub accept_arrays: bool,
    /// Whether the cache index is maintained.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_cache_enabled() -> bool {
    true
}

impl DatasetDescriptor {
    /// Creates a descriptor with defaults: no sync, priority 1000, no arrays, cache on.
    pub fn new(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            folder_namespace: None,
            sync_to_peers: false,
            priority: DEFAULT_PRIORITY,
            accept_arrays: false,
            cache_enabled: true,
        }
    }

    pub fn with_folder_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.folder_namespace = Some(namespace.into());
        self
    }

    pub fn with_sync(mut self, sync_to_peers: bool) -> Self {
        self.sync_to_peers = sync_to_peers;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_arrays(mut self, accept_arrays: bool) -> Self {
        self.accept_arrays = accept_arrays;
        self
    }

    pub fn with_cache(mut self, cache_enabled: bool) -> Self {
        self.cache_enabled = cache_enabled;
        self
    }

    /// Folder path relative to a namespace root, e.g. `mymod/recipes`.
    pub fn folder_path(&self) -> String {
        match &self.folder_namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}/{}", self.folder),
            _ => self.folder.clone(),
        }
    }

    /// Checks the descriptor is usable. Returns the reason when it is not.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("dataset name is empty".into());
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(format!("dataset name {:?} contains whitespace", self.name));
        }
        if self.folder.trim().is_empty() {
            return Err(format!("dataset {} has an empty folder", self.name));
        }
        if self.folder.chars().any(char::is_whitespace) {
            return Err(format!(
                "dataset {} folder {:?} contains whitespace",
                self.name, self.folder
            ));
        }
        Ok(())
    }
}
