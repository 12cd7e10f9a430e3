//! Published dataset state: entries plus the cache index derived from them.

use datasync_types::DocumentId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Cache key every entry is filed under when caching is enabled.
pub const ALL_KEY: &str = "all";

/// Extra cache keys for one entry, in addition to [`ALL_KEY`].
pub type CacheKeyFn<T> = Arc<dyn Fn(&DatasetEntry<T>) -> Vec<String> + Send + Sync>;

/// One decoded, validated record.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry<T> {
    /// The document (or array element) the record came from.
    pub id: DocumentId,
    pub record: T,
    /// Set when validation deferred this record; holds the reason.
    pub deferred: Option<String>,
}

impl<T> DatasetEntry<T> {
    pub fn new(id: DocumentId, record: T) -> Self {
        Self {
            id,
            record,
            deferred: None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }
}

/// Mapping from cache key to the entries filed under it.
///
/// Always built in one pass from a complete entry map; never patched.
#[derive(Debug)]
pub struct CacheIndex<T> {
    keys: HashMap<String, Vec<Arc<DatasetEntry<T>>>>,
}

impl<T> CacheIndex<T> {
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Builds the index for `entries`, filing each under [`ALL_KEY`] and
    /// whatever `extra_keys` returns for it.
    pub fn build(
        entries: &BTreeMap<DocumentId, Arc<DatasetEntry<T>>>,
        extra_keys: Option<&CacheKeyFn<T>>,
    ) -> Self {
        let mut keys: HashMap<String, Vec<Arc<DatasetEntry<T>>>> = HashMap::new();
        for entry in entries.values() {
            keys.entry(ALL_KEY.to_string())
                .or_default()
                .push(entry.clone());
            if let Some(extra) = extra_keys {
                for key in extra(entry.as_ref()) {
                    if key == ALL_KEY {
                        continue;
                    }
                    let bucket = keys.entry(key).or_default();
                    if !bucket.iter().any(|e| Arc::ptr_eq(e, entry)) {
                        bucket.push(entry.clone());
                    }
                }
            }
        }
        Self { keys }
    }

    /// Entries filed under `key`; empty when the key is unknown.
    pub fn get(&self, key: &str) -> &[Arc<DatasetEntry<T>>] {
        self.keys.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All keys present in the index.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The complete state of one dataset type at one point in time.
#[derive(Debug)]
pub struct Snapshot<T> {
    generation: u64,
    entries: BTreeMap<DocumentId, Arc<DatasetEntry<T>>>,
    cache: CacheIndex<T>,
}

impl<T> Snapshot<T> {
    /// The empty generation-0 snapshot every store starts with.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            entries: BTreeMap::new(),
            cache: CacheIndex::empty(),
        }
    }

    pub(crate) fn new(
        generation: u64,
        entries: BTreeMap<DocumentId, Arc<DatasetEntry<T>>>,
        cache: CacheIndex<T>,
    ) -> Self {
        Self {
            generation,
            entries,
            cache,
        }
    }

    /// Monotonic publication counter; 0 before the first publication.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Arc<DatasetEntry<T>>> {
        self.entries.get(id)
    }

    /// Entries in document-id order.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<DatasetEntry<T>>> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.entries.keys()
    }

    pub fn cache(&self) -> &CacheIndex<T> {
        &self.cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
