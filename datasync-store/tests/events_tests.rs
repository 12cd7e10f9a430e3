use datasync_store::{priority, ReloadEvent, ReloadListeners, ReloadOrigin};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

fn event(generation: u64) -> ReloadEvent {
    ReloadEvent {
        dataset_type: "widget".into(),
        generation,
        valid_count: 0,
        invalid_count: 0,
        deferred_count: 0,
        origin: ReloadOrigin::Local,
    }
}

fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Fn(&ReloadEvent) + Send + Sync + 'static {
    let log = log.clone();
    move |_| log.lock().unwrap().push(tag)
}

#[test]
fn listeners_run_in_priority_order() {
    let listeners = ReloadListeners::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    listeners.subscribe(priority::LOWEST, recorder(&log, "lowest"));
    listeners.subscribe(priority::NORMAL, recorder(&log, "normal"));
    listeners.subscribe(priority::HIGHEST, recorder(&log, "highest"));
    listeners.subscribe(priority::LOW, recorder(&log, "low"));

    listeners.emit(&event(1));

    assert_eq!(*log.lock().unwrap(), vec!["highest", "normal", "low", "lowest"]);
}

#[test]
fn equal_priorities_keep_subscription_order() {
    let listeners = ReloadListeners::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    listeners.subscribe(priority::NORMAL, recorder(&log, "a"));
    listeners.subscribe(priority::NORMAL, recorder(&log, "b"));
    listeners.subscribe(priority::HIGH, recorder(&log, "first"));
    listeners.subscribe(priority::NORMAL, recorder(&log, "c"));

    listeners.emit(&event(1));

    assert_eq!(*log.lock().unwrap(), vec!["first", "a", "b", "c"]);
}

#[test]
fn unsubscribe_removes_listener() {
    let listeners = ReloadListeners::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let keep = listeners.subscribe(priority::NORMAL, recorder(&log, "keep"));
    let drop_me = listeners.subscribe(priority::NORMAL, recorder(&log, "drop"));
    assert_eq!(listeners.len(), 2);

    assert!(listeners.unsubscribe(drop_me));
    assert!(!listeners.unsubscribe(drop_me));
    assert_ne!(keep, drop_me);

    listeners.emit(&event(1));
    assert_eq!(*log.lock().unwrap(), vec!["keep"]);
}

#[test]
fn listener_receives_event() {
    let listeners = ReloadListeners::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    listeners.subscribe(priority::NORMAL, move |e| {
        *sink.lock().unwrap() = Some(e.clone());
    });

    listeners.emit(&event(7));

    assert_eq!(seen.lock().unwrap().as_ref().map(|e| e.generation), Some(7));
}

#[test]
fn subscribe_from_inside_callback_does_not_deadlock() {
    let listeners = Arc::new(ReloadListeners::new());
    let inner = listeners.clone();
    listeners.subscribe(priority::NORMAL, move |_| {
        inner.subscribe(priority::LOW, |_| {});
    });

    listeners.emit(&event(1));
    assert_eq!(listeners.len(), 2);
}

#[test]
fn priority_constants_are_ordered() {
    let all = [
        priority::HIGHEST,
        priority::VERY_HIGH,
        priority::HIGH,
        priority::ABOVE_NORMAL,
        priority::NORMAL,
        priority::BELOW_NORMAL,
        priority::LOW,
        priority::VERY_LOW,
        priority::LOWEST,
    ];
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(priority::NORMAL, 0);
}
