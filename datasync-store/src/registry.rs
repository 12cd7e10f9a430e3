//! Registry of dataset types.

use crate::error::{ConfigurationError, StoreResult};
use crate::events::ReloadEvent;
use crate::snapshot::{CacheKeyFn, DatasetEntry};
use crate::source::DocumentSource;
use crate::store::{Dataset, DatasetStore, SyncTrigger};
use datasync_model::{AcceptAll, DatasetDescriptor, JsonCodec, RecordCodec, RecordValidator};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, info, warn};

/// Everything needed to register one dataset type.
pub struct DatasetRegistration<T> {
    descriptor: DatasetDescriptor,
    codec: Option<Arc<dyn RecordCodec<T>>>,
    validator: Arc<dyn RecordValidator<T>>,
    cache_keys: Option<CacheKeyFn<T>>,
}

impl<T> DatasetRegistration<T>
where
    T: Send + Sync + 'static,
{
    /// Starts a registration with the always-valid validator and no codec.
    pub fn new(descriptor: DatasetDescriptor) -> Self {
        Self {
            descriptor,
            codec: None,
            validator: Arc::new(AcceptAll),
            cache_keys: None,
        }
    }

    pub fn codec(mut self, codec: impl RecordCodec<T> + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Uses the record's serde implementation as codec.
    pub fn json_codec(self) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        self.codec(JsonCodec::<T>::new())
    }

    pub fn validator(mut self, validator: impl RecordValidator<T> + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Files each entry under extra cache keys besides `"all"`.
    pub fn cache_keys<F>(mut self, keys: F) -> Self
    where
        F: Fn(&DatasetEntry<T>) -> Vec<String> + Send + Sync + 'static,
    {
        self.cache_keys = Some(Arc::new(keys));
        self
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }
}

/// Tracks every registered dataset type.
///
/// Construct one per process (or per test) and pass it by reference; there
/// is no global instance.
#[derive(Default)]
pub struct DatasetRegistry {
    datasets: RwLock<Vec<Arc<dyn Dataset>>>,
    initialized: AtomicBool,
    sync_trigger: RwLock<Option<Weak<dyn SyncTrigger>>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dataset type and returns its store.
    ///
    /// Registering the same descriptor and record type again returns the
    /// existing store.
    pub fn register<T>(&self, registration: DatasetRegistration<T>) -> StoreResult<Arc<DatasetStore<T>>>
    where
        T: Send + Sync + 'static,
    {
        let DatasetRegistration {
            descriptor,
            codec,
            validator,
            cache_keys,
        } = registration;

        descriptor
            .check()
            .map_err(ConfigurationError::InvalidDescriptor)?;
        let codec = codec.ok_or_else(|| ConfigurationError::MissingCodec(descriptor.name.clone()))?;

        let mut datasets = self.datasets.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = datasets.iter().find(|d| d.descriptor().name == descriptor.name) {
            if existing.descriptor() != &descriptor {
                return Err(ConfigurationError::Conflict {
                    name: descriptor.name,
                    reason: "descriptor metadata differs".into(),
                }
                .into());
            }
            return match existing.clone().as_any().downcast::<DatasetStore<T>>() {
                Ok(store) => {
                    debug!("Dataset type {} already registered", descriptor.name);
                    Ok(store)
                }
                Err(_) => Err(ConfigurationError::Conflict {
                    name: descriptor.name,
                    reason: "registered with a different record type".into(),
                }
                .into()),
            };
        }

        let store = Arc::new(DatasetStore::new(descriptor, codec, validator, cache_keys));
        if let Some(trigger) = self
            .sync_trigger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            store.set_sync_trigger(trigger);
        }
        datasets.push(store.clone());

        debug!(
            "Registered dataset type: {} (priority {})",
            store.name(),
            store.descriptor().priority
        );
        Ok(store)
    }

    /// One-time setup. Returns `true` on the first call, `false` afterwards.
    pub fn initialize(&self) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!("Dataset registry initialized with {} registered types", self.len());
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Descriptors sorted by ascending priority, ties in registration order.
    pub fn ordered_types(&self) -> Vec<DatasetDescriptor> {
        self.ordered()
            .iter()
            .map(|d| d.descriptor().clone())
            .collect()
    }

    /// Stores in the same order as [`DatasetRegistry::ordered_types`].
    pub fn ordered(&self) -> Vec<Arc<dyn Dataset>> {
        let mut datasets = self
            .datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        datasets.sort_by_key(|d| d.descriptor().priority);
        datasets
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Dataset>> {
        self.datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.descriptor().name == name)
            .cloned()
    }

    /// Typed access to a registered store.
    pub fn store<T>(&self, name: &str) -> Option<Arc<DatasetStore<T>>>
    where
        T: Send + Sync + 'static,
    {
        self.get(name)?.as_any().downcast::<DatasetStore<T>>().ok()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reloads every type in priority order from `source`.
    ///
    /// A source failure for one type is logged and that type keeps its
    /// current snapshot.
    pub fn reload_all(&self, source: &dyn DocumentSource) -> Vec<ReloadEvent> {
        let mut events = Vec::new();
        for dataset in self.ordered() {
            let descriptor = dataset.descriptor();
            match source.load(descriptor) {
                Ok(documents) => events.push(dataset.reload_documents(documents)),
                Err(e) => warn!("Failed to load {} documents: {}", descriptor.name, e),
            }
        }
        events
    }

    /// Wires a sync hook into every current and future store.
    pub fn attach_sync(&self, trigger: Weak<dyn SyncTrigger>) {
        *self
            .sync_trigger
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(trigger.clone());
        for dataset in self
            .datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            dataset.set_sync_trigger(trigger.clone());
        }
    }
}
