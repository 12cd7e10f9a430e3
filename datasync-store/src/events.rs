//! Reload-completed notifications.
//!
//! Listeners are plain callbacks kept in an explicit list ordered by
//! priority (lower runs first); equal priorities run in subscription order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Named listener priorities. Lower values run earlier.
pub mod priority {
    /// Core system level.
    pub const HIGHEST: i32 = -1000;
    pub const VERY_HIGH: i32 = -750;
    pub const HIGH: i32 = -500;
    pub const ABOVE_NORMAL: i32 = -250;
    /// Default.
    pub const NORMAL: i32 = 0;
    pub const BELOW_NORMAL: i32 = 250;
    pub const LOW: i32 = 500;
    pub const VERY_LOW: i32 = 750;
    /// Cleanup and bookkeeping.
    pub const LOWEST: i32 = 1000;
}

/// Where a published snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOrigin {
    /// Built from local documents by `reload`.
    Local,
    /// Received from a peer through `replace_snapshot`.
    Remote,
}

/// Emitted after every publication of a dataset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    pub dataset_type: String,
    /// Generation of the snapshot that was published.
    pub generation: u64,
    /// Records admitted to the snapshot (deferred ones included).
    pub valid_count: usize,
    /// Records skipped because they failed to decode or validate.
    pub invalid_count: usize,
    /// Admitted records awaiting re-validation.
    pub deferred_count: usize,
    pub origin: ReloadOrigin,
}

/// Handle returned by [`ReloadListeners::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&ReloadEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    priority: i32,
    callback: Callback,
}

/// Priority-ordered list of reload callbacks.
#[derive(Default)]
pub struct ReloadListeners {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Listener>>,
}

impl ReloadListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback. Returns the id used to remove it again.
    pub fn subscribe<F>(&self, priority: i32, callback: F) -> ListenerId
    where
        F: Fn(&ReloadEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let pos = listeners.partition_point(|l| l.priority <= priority);
        listeners.insert(
            pos,
            Listener {
                id,
                priority,
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Removes a callback. Returns whether it was present.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every callback in priority order.
    ///
    /// The list lock is released before callbacks run, so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub fn emit(&self, event: &ReloadEvent) {
        let callbacks: Vec<Callback> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|l| l.callback.clone())
            .collect();
        debug!(
            "Notifying {} listeners of {} reload (generation {})",
            callbacks.len(),
            event.dataset_type,
            event.generation
        );
        for callback in callbacks {
            callback(event);
        }
    }
}
