//! Dataset lifecycle manager.
//!
//! A [`DatasetStore`] owns the current [`Snapshot`] of one dataset type and
//! rebuilds it from raw JSON documents:
//!
//! 1. **Expand**: array documents become one candidate per element (`id_<n>`)
//! 2. **Decode**: each candidate goes through the type's `RecordCodec`
//! 3. **Validate**: the type's `RecordValidator` admits, rejects or defers it
//! 4. **Publish**: snapshot and cache index are swapped in atomically
//! 5. **Notify**: reload listeners run in priority order, then sync is triggered
//!
//! A [`DatasetRegistry`] tracks every registered type with its priority and
//! drives ordered reloads from a [`DocumentSource`].
//!
//! # Example
//!
//! ```
//! use datasync_model::DatasetDescriptor;
//! use datasync_store::{DatasetRegistration, DatasetRegistry, Documents};
//! use datasync_types::DocumentId;
//! use serde_json::json;
//!
//! let registry = DatasetRegistry::new();
//! let widgets = registry
//!     .register(DatasetRegistration::<serde_json::Value>::new(
//!         DatasetDescriptor::new("widget", "widgets"),
//!     ).json_codec())
//!     .unwrap();
//!
//! let mut docs = Documents::new();
//! docs.insert(DocumentId::parse("shop:gear").unwrap(), json!({"teeth": 12}));
//! let event = widgets.reload(docs);
//! assert_eq!(event.valid_count, 1);
//! ```

mod error;
mod events;
mod registry;
mod snapshot;
mod source;
mod store;

pub use error::{ConfigurationError, StoreError, StoreResult};
pub use events::{priority, ListenerId, ReloadEvent, ReloadListeners, ReloadOrigin};
pub use registry::{DatasetRegistration, DatasetRegistry};
pub use snapshot::{CacheIndex, CacheKeyFn, DatasetEntry, Snapshot, ALL_KEY};
pub use source::{DirectorySource, DocumentSource, Documents, StaticSource};
pub use store::{Dataset, DatasetStore, StoreState, SyncTrigger};
