//! The per-type dataset store.

use crate::error::{StoreError, StoreResult};
use crate::events::{ListenerId, ReloadEvent, ReloadListeners, ReloadOrigin};
use crate::snapshot::{CacheIndex, CacheKeyFn, DatasetEntry, Snapshot};
use crate::source::Documents;
use arc_swap::ArcSwap;
use datasync_model::{DatasetDescriptor, RecordCodec, RecordValidator, ValidationOutcome};
use datasync_types::DocumentId;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Nothing published yet.
    Empty,
    /// A reload or replacement is building the next snapshot.
    Loading,
    /// A snapshot has been published.
    Ready,
}

impl StoreState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Loading,
            2 => Self::Ready,
            _ => Self::Empty,
        }
    }
}

/// Hook through which a store asks the sync layer to push a fresh snapshot.
pub trait SyncTrigger: Send + Sync {
    /// Whether at least one remote peer is connected.
    fn has_peers(&self) -> bool;

    /// Called after a local reload of a sync-enabled type was published.
    fn dataset_published(&self, dataset_type: &str);
}

/// Type-erased view of a [`DatasetStore`], used by the registry and the sync layer.
pub trait Dataset: Send + Sync {
    fn descriptor(&self) -> &DatasetDescriptor;

    /// Number of entries in the current snapshot.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generation(&self) -> u64;

    fn state(&self) -> StoreState;

    /// Rebuilds the snapshot from raw documents. See [`DatasetStore::reload`].
    fn reload_documents(&self, documents: Documents) -> ReloadEvent;

    /// Serializes the current snapshot as a JSON object of id → encoded record.
    fn encode_snapshot(&self) -> StoreResult<Vec<u8>>;

    /// Decodes bytes produced by [`Dataset::encode_snapshot`] and installs
    /// them with `replace_snapshot`. Nothing is installed unless every
    /// record decodes.
    fn apply_encoded(&self, bytes: &[u8]) -> StoreResult<ReloadEvent>;

    /// Adds a reload listener. See [`ReloadListeners::subscribe`].
    fn subscribe(
        &self,
        priority: i32,
        callback: Box<dyn Fn(&ReloadEvent) + Send + Sync>,
    ) -> ListenerId;

    fn set_sync_trigger(&self, trigger: Weak<dyn SyncTrigger>);

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[derive(Default)]
struct LoadCounts {
    valid: usize,
    invalid: usize,
    deferred: usize,
}

/// Owns the current snapshot and cache index of one dataset type.
///
/// Readers load the published [`Snapshot`] without locking. Writers
/// (`reload`, `replace_snapshot`) are serialized and publish by swapping in a
/// fully built snapshot.
pub struct DatasetStore<T> {
    descriptor: DatasetDescriptor,
    codec: Arc<dyn RecordCodec<T>>,
    validator: Arc<dyn RecordValidator<T>>,
    cache_keys: Option<CacheKeyFn<T>>,
    current: ArcSwap<Snapshot<T>>,
    state: AtomicU8,
    generation: AtomicU64,
    write_lock: Mutex<()>,
    listeners: ReloadListeners,
    sync_trigger: RwLock<Option<Weak<dyn SyncTrigger>>>,
}

impl<T> std::fmt::Debug for DatasetStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl<T> DatasetStore<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an empty store. Prefer [`crate::DatasetRegistry::register`],
    /// which also validates the descriptor.
    pub fn new(
        descriptor: DatasetDescriptor,
        codec: Arc<dyn RecordCodec<T>>,
        validator: Arc<dyn RecordValidator<T>>,
        cache_keys: Option<CacheKeyFn<T>>,
    ) -> Self {
        Self {
            descriptor,
            codec,
            validator,
            cache_keys,
            current: ArcSwap::from_pointee(Snapshot::empty()),
            state: AtomicU8::new(StoreState::Empty as u8),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            listeners: ReloadListeners::new(),
            sync_trigger: RwLock::new(None),
        }
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn state(&self) -> StoreState {
        StoreState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn listeners(&self) -> &ReloadListeners {
        &self.listeners
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Pins the current snapshot. The returned view never changes.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.current.load_full()
    }

    pub fn get(&self, id: &DocumentId) -> Option<Arc<DatasetEntry<T>>> {
        self.current.load().get(id).cloned()
    }

    /// All entries of the current snapshot, in document-id order.
    pub fn all(&self) -> Vec<Arc<DatasetEntry<T>>> {
        self.current.load().entries().cloned().collect()
    }

    /// Entries filed under `key` in the current cache index.
    pub fn by_cache_key(&self, key: &str) -> StoreResult<Vec<Arc<DatasetEntry<T>>>> {
        if !self.descriptor.cache_enabled {
            return Err(StoreError::CacheDisabled(self.descriptor.name.clone()));
        }
        Ok(self.current.load().cache().get(key).to_vec())
    }

    /// Ids of admitted records whose validation was deferred.
    pub fn deferred_ids(&self) -> Vec<DocumentId> {
        self.current
            .load()
            .entries()
            .filter(|e| e.is_deferred())
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Rebuilds the snapshot from `documents`.
    ///
    /// The result replaces the previous snapshot entirely. Documents that
    /// fail to decode or validate are counted and skipped; the reload itself
    /// always completes and publishes, even when nothing is valid.
    pub fn reload(&self, documents: Documents) -> ReloadEvent {
        let event = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.state.store(StoreState::Loading as u8, Ordering::Release);

            info!(
                "Loading {} data from {} documents",
                self.descriptor.name,
                documents.len()
            );

            let mut entries = BTreeMap::new();
            let mut counts = LoadCounts::default();

            for (id, document) in documents {
                match document {
                    serde_json::Value::Array(items) if self.descriptor.accept_arrays => {
                        debug!("Processing array with {} elements from {}", items.len(), id);
                        for (index, item) in items.iter().enumerate() {
                            self.admit(id.element(index), item, &mut entries, &mut counts);
                        }
                    }
                    other => self.admit(id, &other, &mut entries, &mut counts),
                }
            }

            info!(
                "Loaded {} valid {} entries ({} deferred), {} invalid entries were skipped",
                counts.valid, self.descriptor.name, counts.deferred, counts.invalid
            );

            self.publish(entries, counts, ReloadOrigin::Local)
        };

        self.trigger_sync();
        event
    }

    /// Installs a snapshot received from a peer, replacing the current one.
    pub fn replace_snapshot(&self, records: BTreeMap<DocumentId, T>) -> ReloadEvent {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.store(StoreState::Loading as u8, Ordering::Release);

        let entries: BTreeMap<DocumentId, Arc<DatasetEntry<T>>> = records
            .into_iter()
            .map(|(id, record)| (id.clone(), Arc::new(DatasetEntry::new(id, record))))
            .collect();
        let counts = LoadCounts {
            valid: entries.len(),
            ..LoadCounts::default()
        };

        debug!(
            "Replacing {} snapshot with {} remote entries",
            self.descriptor.name, counts.valid
        );
        self.publish(entries, counts, ReloadOrigin::Remote)
    }

    /// Registers the sync hook consulted after local reloads.
    pub fn set_sync_trigger(&self, trigger: Weak<dyn SyncTrigger>) {
        *self
            .sync_trigger
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(trigger);
    }

    fn admit(
        &self,
        id: DocumentId,
        document: &serde_json::Value,
        entries: &mut BTreeMap<DocumentId, Arc<DatasetEntry<T>>>,
        counts: &mut LoadCounts,
    ) {
        let record = match self.codec.decode(document) {
            Ok(record) => record,
            Err(e) => {
                counts.invalid += 1;
                error!("Failed to parse {} data from {}: {}", self.descriptor.name, id, e);
                return;
            }
        };

        let deferred = match self.validator.validate(&record, &id) {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Deferred(reason) => {
                debug!("Deferred validation of {} {}: {}", self.descriptor.name, id, reason);
                Some(reason)
            }
            ValidationOutcome::Invalid(reason) => {
                counts.invalid += 1;
                warn!("Invalid {} data in {}: {}", self.descriptor.name, id, reason);
                return;
            }
        };

        let is_deferred = deferred.is_some();
        let entry = Arc::new(DatasetEntry {
            id: id.clone(),
            record,
            deferred,
        });
        match entries.insert(id.clone(), entry) {
            Some(previous) => {
                warn!("Duplicate {} id {}, later document wins", self.descriptor.name, id);
                if previous.is_deferred() {
                    counts.deferred -= 1;
                }
            }
            None => counts.valid += 1,
        }
        if is_deferred {
            counts.deferred += 1;
        }
        debug!("Loaded {}: {}", self.descriptor.name, id);
    }

    /// Builds the cache, swaps in the new snapshot and notifies listeners.
    /// Caller holds `write_lock`.
    fn publish(
        &self,
        entries: BTreeMap<DocumentId, Arc<DatasetEntry<T>>>,
        counts: LoadCounts,
        origin: ReloadOrigin,
    ) -> ReloadEvent {
        let cache = if self.descriptor.cache_enabled {
            CacheIndex::build(&entries, self.cache_keys.as_ref())
        } else {
            CacheIndex::empty()
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.current
            .store(Arc::new(Snapshot::new(generation, entries, cache)));
        self.state.store(StoreState::Ready as u8, Ordering::Release);

        let event = ReloadEvent {
            dataset_type: self.descriptor.name.clone(),
            generation,
            valid_count: counts.valid,
            invalid_count: counts.invalid,
            deferred_count: counts.deferred,
            origin,
        };
        self.listeners.emit(&event);
        event
    }

    fn trigger_sync(&self) {
        if !self.descriptor.sync_to_peers {
            return;
        }
        let trigger = self
            .sync_trigger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);
        match trigger {
            Some(trigger) if trigger.has_peers() => {
                trigger.dataset_published(&self.descriptor.name);
            }
            Some(_) => debug!("No peers connected, skipping {} sync", self.descriptor.name),
            None => {}
        }
    }

    fn encode_records(&self) -> StoreResult<serde_json::Map<String, serde_json::Value>> {
        let snapshot = self.current.load();
        let mut map = serde_json::Map::with_capacity(snapshot.len());
        for entry in snapshot.entries() {
            let value = self
                .codec
                .encode(&entry.record)
                .map_err(|source| StoreError::Encode {
                    id: entry.id.clone(),
                    source,
                })?;
            map.insert(entry.id.to_string(), value);
        }
        Ok(map)
    }

    fn decode_records(&self, bytes: &[u8]) -> StoreResult<BTreeMap<DocumentId, T>> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let serde_json::Value::Object(map) = value else {
            return Err(StoreError::MalformedSnapshot(format!(
                "expected a JSON object for {}",
                self.descriptor.name
            )));
        };
        let mut records = BTreeMap::new();
        for (key, document) in map {
            let id = DocumentId::parse(&key)
                .map_err(|e| StoreError::MalformedSnapshot(e.to_string()))?;
            let record = self
                .codec
                .decode(&document)
                .map_err(|source| StoreError::Decode { id: key, source })?;
            records.insert(id, record);
        }
        Ok(records)
    }
}

impl<T> Dataset for DatasetStore<T>
where
    T: Send + Sync + 'static,
{
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn len(&self) -> usize {
        DatasetStore::len(self)
    }

    fn generation(&self) -> u64 {
        DatasetStore::generation(self)
    }

    fn state(&self) -> StoreState {
        DatasetStore::state(self)
    }

    fn reload_documents(&self, documents: Documents) -> ReloadEvent {
        self.reload(documents)
    }

    fn encode_snapshot(&self) -> StoreResult<Vec<u8>> {
        let map = self.encode_records()?;
        Ok(serde_json::to_vec(&serde_json::Value::Object(map))?)
    }

    fn apply_encoded(&self, bytes: &[u8]) -> StoreResult<ReloadEvent> {
        let records = self.decode_records(bytes)?;
        Ok(self.replace_snapshot(records))
    }

    fn subscribe(
        &self,
        priority: i32,
        callback: Box<dyn Fn(&ReloadEvent) + Send + Sync>,
    ) -> ListenerId {
        self.listeners.subscribe(priority, callback)
    }

    fn set_sync_trigger(&self, trigger: Weak<dyn SyncTrigger>) {
        DatasetStore::set_sync_trigger(self, trigger);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
