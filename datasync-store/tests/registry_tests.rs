use datasync_model::{DatasetDescriptor, DEFAULT_PRIORITY};
use datasync_store::{
    ConfigurationError, DatasetRegistration, DatasetRegistry, Documents, StaticSource,
    StoreError, SyncTrigger,
};
use datasync_types::DocumentId;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex, Weak};

fn json_registration(descriptor: DatasetDescriptor) -> DatasetRegistration<serde_json::Value> {
    DatasetRegistration::new(descriptor).json_codec()
}

fn names(registry: &DatasetRegistry) -> Vec<String> {
    registry
        .ordered_types()
        .into_iter()
        .map(|d| d.name)
        .collect()
}

// ── Registration ─────────────────────────────────────────────────

#[test]
fn register_returns_store() {
    let registry = DatasetRegistry::new();
    let store = registry
        .register(json_registration(DatasetDescriptor::new("widget", "widgets")))
        .unwrap();

    assert_eq!(store.name(), "widget");
    assert!(registry.is_registered("widget"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn register_without_codec_is_configuration_error() {
    let registry = DatasetRegistry::new();
    let err = registry
        .register(DatasetRegistration::<serde_json::Value>::new(
            DatasetDescriptor::new("widget", "widgets"),
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Configuration(ConfigurationError::MissingCodec(name)) if name == "widget"
    ));
    assert!(registry.is_empty());
}

#[test]
fn register_invalid_descriptor_is_configuration_error() {
    let registry = DatasetRegistry::new();
    let err = registry
        .register(json_registration(DatasetDescriptor::new("", "widgets")))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Configuration(ConfigurationError::InvalidDescriptor(_))
    ));
}

#[test]
fn register_same_descriptor_is_idempotent() {
    let registry = DatasetRegistry::new();
    let descriptor = DatasetDescriptor::new("widget", "widgets").with_priority(5);
    let first = registry.register(json_registration(descriptor.clone())).unwrap();
    let second = registry.register(json_registration(descriptor)).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn register_conflicting_metadata_fails() {
    let registry = DatasetRegistry::new();
    registry
        .register(json_registration(DatasetDescriptor::new("widget", "widgets")))
        .unwrap();
    let err = registry
        .register(json_registration(
            DatasetDescriptor::new("widget", "widgets").with_sync(true),
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Configuration(ConfigurationError::Conflict { .. })
    ));
}

#[test]
fn register_conflicting_record_type_fails() {
    let registry = DatasetRegistry::new();
    registry
        .register(json_registration(DatasetDescriptor::new("widget", "widgets")))
        .unwrap();
    let err = registry
        .register(DatasetRegistration::<String>::new(DatasetDescriptor::new("widget", "widgets")).json_codec())
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Configuration(ConfigurationError::Conflict { reason, .. })
            if reason.contains("record type")
    ));
}

#[test]
fn typed_lookup() {
    let registry = DatasetRegistry::new();
    let store = registry
        .register(json_registration(DatasetDescriptor::new("widget", "widgets")))
        .unwrap();

    let found = registry.store::<serde_json::Value>("widget").unwrap();
    assert!(Arc::ptr_eq(&store, &found));
    assert!(registry.store::<String>("widget").is_none());
    assert!(registry.store::<serde_json::Value>("missing").is_none());
    assert!(registry.get("missing").is_none());
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn ordered_types_sort_by_priority() {
    let registry = DatasetRegistry::new();
    for (name, priority) in [("fifty", 50), ("ten", 10), ("thousand", 1000)] {
        registry
            .register(json_registration(
                DatasetDescriptor::new(name, name).with_priority(priority),
            ))
            .unwrap();
    }

    let priorities: Vec<i32> = registry
        .ordered_types()
        .iter()
        .map(|d| d.priority)
        .collect();
    assert_eq!(priorities, vec![10, 50, 1000]);
    assert_eq!(names(&registry), vec!["ten", "fifty", "thousand"]);
}

#[test]
fn ordered_types_tie_break_by_registration_order() {
    let registry = DatasetRegistry::new();
    for name in ["c", "a", "b"] {
        registry
            .register(json_registration(DatasetDescriptor::new(name, name)))
            .unwrap();
    }
    registry
        .register(json_registration(
            DatasetDescriptor::new("first", "first").with_priority(-1),
        ))
        .unwrap();

    assert_eq!(names(&registry), vec!["first", "c", "a", "b"]);
    assert_eq!(registry.ordered_types()[1].priority, DEFAULT_PRIORITY);
}

// ── Initialization ───────────────────────────────────────────────

#[test]
fn initialize_is_idempotent() {
    let registry = DatasetRegistry::new();
    assert!(!registry.is_initialized());
    assert!(registry.initialize());
    assert!(!registry.initialize());
    assert!(registry.is_initialized());
}

#[test]
fn registries_are_isolated() {
    let a = DatasetRegistry::new();
    let b = DatasetRegistry::new();
    a.register(json_registration(DatasetDescriptor::new("widget", "widgets")))
        .unwrap();
    a.initialize();

    assert!(!b.is_registered("widget"));
    assert!(!b.is_initialized());
}

// ── reload_all ───────────────────────────────────────────────────

#[test]
fn reload_all_runs_in_priority_order() {
    let registry = DatasetRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for (name, priority) in [("late", 100), ("early", 1)] {
        let store = registry
            .register(json_registration(
                DatasetDescriptor::new(name, name).with_priority(priority),
            ))
            .unwrap();
        let order = order.clone();
        store
            .listeners()
            .subscribe(0, move |e| order.lock().unwrap().push(e.dataset_type.clone()));
    }

    let mut early = Documents::new();
    early.insert(DocumentId::parse("a:one").unwrap(), json!({"x": 1}));
    let source = StaticSource::new().with("early", early);

    let events = registry.reload_all(&source);

    assert_eq!(events.len(), 2);
    assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
    assert_eq!(events[0].valid_count, 1);
    assert_eq!(events[1].valid_count, 0);
}

// ── Sync trigger wiring ──────────────────────────────────────────

#[derive(Default)]
struct RecordingTrigger {
    peers: bool,
    published: Mutex<Vec<String>>,
}

impl SyncTrigger for RecordingTrigger {
    fn has_peers(&self) -> bool {
        self.peers
    }

    fn dataset_published(&self, dataset_type: &str) {
        self.published.lock().unwrap().push(dataset_type.to_string());
    }
}

fn one_doc() -> Documents {
    let mut docs = Documents::new();
    docs.insert(DocumentId::parse("a:one").unwrap(), json!({"x": 1}));
    docs
}

#[test]
fn attach_sync_reaches_existing_and_future_stores() {
    let registry = DatasetRegistry::new();
    let before = registry
        .register(json_registration(
            DatasetDescriptor::new("before", "before").with_sync(true),
        ))
        .unwrap();

    let trigger = Arc::new(RecordingTrigger {
        peers: true,
        ..Default::default()
    });
    let weak: Weak<dyn SyncTrigger> = Arc::downgrade(&trigger) as Weak<dyn SyncTrigger>;
    registry.attach_sync(weak);

    let after = registry
        .register(json_registration(
            DatasetDescriptor::new("after", "after").with_sync(true),
        ))
        .unwrap();

    before.reload(one_doc());
    after.reload(one_doc());

    assert_eq!(*trigger.published.lock().unwrap(), vec!["before", "after"]);
}

#[test]
fn sync_not_triggered_without_peers_or_when_disabled() {
    let registry = DatasetRegistry::new();
    let quiet = registry
        .register(json_registration(DatasetDescriptor::new("quiet", "quiet")))
        .unwrap();
    let synced = registry
        .register(json_registration(
            DatasetDescriptor::new("synced", "synced").with_sync(true),
        ))
        .unwrap();

    let trigger = Arc::new(RecordingTrigger::default());
    registry.attach_sync(Arc::downgrade(&trigger) as Weak<dyn SyncTrigger>);

    quiet.reload(one_doc());
    synced.reload(one_doc());

    assert!(trigger.published.lock().unwrap().is_empty());
}

#[test]
fn replace_snapshot_does_not_trigger_sync() {
    let registry = DatasetRegistry::new();
    let synced = registry
        .register(json_registration(
            DatasetDescriptor::new("synced", "synced").with_sync(true),
        ))
        .unwrap();
    let trigger = Arc::new(RecordingTrigger {
        peers: true,
        ..Default::default()
    });
    registry.attach_sync(Arc::downgrade(&trigger) as Weak<dyn SyncTrigger>);

    synced.replace_snapshot(Default::default());

    assert!(trigger.published.lock().unwrap().is_empty());
}

#[test]
fn dropped_trigger_is_ignored() {
    let registry = DatasetRegistry::new();
    let synced = registry
        .register(json_registration(
            DatasetDescriptor::new("synced", "synced").with_sync(true),
        ))
        .unwrap();
    let trigger = Arc::new(RecordingTrigger {
        peers: true,
        ..Default::default()
    });
    registry.attach_sync(Arc::downgrade(&trigger) as Weak<dyn SyncTrigger>);
    drop(trigger);

    let event = synced.reload(one_doc());
    assert_eq!(event.valid_count, 1);
}

#[test]
fn erased_dataset_subscription() {
    let registry = DatasetRegistry::new();
    registry
        .register(json_registration(DatasetDescriptor::new("widget", "widgets")))
        .unwrap();
    let dataset = registry.get("widget").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    dataset.subscribe(
        0,
        Box::new(move |e| sink.lock().unwrap().push(e.valid_count)),
    );

    let event = dataset.reload_documents(one_doc());

    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(event.generation, dataset.generation());
    assert_eq!(dataset.len(), 1);
}
