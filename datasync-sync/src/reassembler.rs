//! Reassembly of chunked transmissions.
//!
//! Sessions are created lazily on the first chunk of a transmission and
//! removed when they complete, when they are abandoned, or when a sweep
//! finds them older than the session timeout. The table lock is held only
//! for lookups; chunks are stored under the session's own lock so only one
//! receiver can declare a session complete.

use crate::protocol::{Chunk, DEFAULT_MAX_TOTAL_CHUNKS};
use datasync_types::SessionId;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A fully reassembled payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPayload {
    pub session_id: SessionId,
    pub dataset_type: String,
    pub bytes: Vec<u8>,
}

/// Result of feeding one chunk to a [`Reassembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Stored; the session still misses chunks.
    Pending { received: u32, total: u32 },
    /// The slot was already filled, or the session already finished.
    Duplicate,
    /// Malformed chunk, dropped without touching any session.
    Rejected(String),
    /// The session completed with this chunk.
    Complete(AssembledPayload),
    /// The session could not be assembled and was dropped.
    Abandoned(String),
}

struct SyncSession {
    dataset_type: String,
    total: u32,
    // Keyed by index; grows with chunks received, not with `total`.
    slots: BTreeMap<u32, Vec<u8>>,
    created: Instant,
    finished: bool,
}

impl SyncSession {
    fn new(chunk: &Chunk, created: Instant) -> Self {
        Self {
            dataset_type: chunk.dataset_type.clone(),
            total: chunk.total,
            slots: BTreeMap::new(),
            created,
            finished: false,
        }
    }

    fn received(&self) -> u32 {
        self.slots.len() as u32
    }

    fn assemble(&mut self) -> Result<Vec<u8>, String> {
        let slots = std::mem::take(&mut self.slots);
        let size = slots.values().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(size);
        for (expected, (index, payload)) in (0..self.total).zip(slots) {
            if index != expected {
                return Err(format!("chunk {expected} missing at completion"));
            }
            bytes.extend_from_slice(&payload);
        }
        Ok(bytes)
    }
}

/// Tracks in-flight sessions from one peer and reassembles them.
pub struct Reassembler {
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<SyncSession>>>>,
    session_timeout: Duration,
    max_total_chunks: u32,
}

impl Reassembler {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            session_timeout,
            max_total_chunks: DEFAULT_MAX_TOTAL_CHUNKS,
        }
    }

    /// Sets the largest `total` a transmission may declare. Chunks claiming
    /// more are rejected before any session is opened.
    pub fn with_max_total_chunks(mut self, max_total_chunks: u32) -> Self {
        self.max_total_chunks = max_total_chunks;
        self
    }

    /// Feeds one chunk. Never fails: every problem becomes an outcome.
    pub fn receive(&self, chunk: Chunk) -> ReceiveOutcome {
        if chunk.total == 0 {
            warn!("Rejected {} chunk with zero total", chunk.dataset_type);
            return ReceiveOutcome::Rejected("total chunk count is zero".into());
        }
        if chunk.total > self.max_total_chunks {
            warn!(
                "Rejected {} chunk: total {} exceeds limit of {}",
                chunk.dataset_type, chunk.total, self.max_total_chunks
            );
            return ReceiveOutcome::Rejected(format!(
                "total {} exceeds limit of {} chunks",
                chunk.total, self.max_total_chunks
            ));
        }
        if !chunk.in_bounds() {
            warn!(
                "Rejected {} chunk: index {} out of range for {} chunks",
                chunk.dataset_type, chunk.index, chunk.total
            );
            return ReceiveOutcome::Rejected(format!(
                "index {} out of range for {} chunks",
                chunk.index, chunk.total
            ));
        }

        if chunk.is_single() {
            debug!(
                "Received {} ({} bytes) in a single chunk",
                chunk.dataset_type,
                chunk.payload.len()
            );
            return ReceiveOutcome::Complete(AssembledPayload {
                session_id: chunk.session_id,
                dataset_type: chunk.dataset_type,
                bytes: chunk.payload,
            });
        }

        let session_id = chunk.session_id;
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(SyncSession::new(&chunk, Instant::now()))))
            .clone();

        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.finished {
            return ReceiveOutcome::Duplicate;
        }
        if session.total != chunk.total {
            warn!(
                "Rejected chunk for session {}: total {} does not match {}",
                session_id, chunk.total, session.total
            );
            return ReceiveOutcome::Rejected(format!(
                "total {} does not match session total {}",
                chunk.total, session.total
            ));
        }
        if session.dataset_type != chunk.dataset_type {
            warn!(
                "Rejected chunk for session {}: dataset type {} does not match {}",
                session_id, chunk.dataset_type, session.dataset_type
            );
            return ReceiveOutcome::Rejected(format!(
                "dataset type {} does not match session type {}",
                chunk.dataset_type, session.dataset_type
            ));
        }

        if session.slots.contains_key(&chunk.index) {
            debug!("Duplicate chunk {} for session {}", chunk.index, session_id);
            return ReceiveOutcome::Duplicate;
        }
        session.slots.insert(chunk.index, chunk.payload);

        let received = session.received();
        if received < session.total {
            debug!(
                "Received chunk {} of session {} ({}/{})",
                chunk.index, session_id, received, session.total
            );
            return ReceiveOutcome::Pending {
                received,
                total: session.total,
            };
        }

        session.finished = true;
        let result = session.assemble();
        let dataset_type = session.dataset_type.clone();
        drop(session);
        self.remove(&session_id);

        match result {
            Ok(bytes) => {
                debug!(
                    "Reassembled {} ({} bytes) from session {}",
                    dataset_type,
                    bytes.len(),
                    session_id
                );
                ReceiveOutcome::Complete(AssembledPayload {
                    session_id,
                    dataset_type,
                    bytes,
                })
            }
            Err(reason) => {
                warn!("Abandoned session {}: {}", session_id, reason);
                ReceiveOutcome::Abandoned(reason)
            }
        }
    }

    /// Number of in-flight sessions.
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Removes sessions older than the session timeout. Returns how many.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    /// Like [`Reassembler::sweep_expired`], with an explicit clock reading.
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|id, session| {
            let session = session.lock().unwrap_or_else(PoisonError::into_inner);
            let expired = now.saturating_duration_since(session.created) > self.session_timeout;
            if expired {
                debug!(
                    "Expiring session {} ({}, {}/{} chunks)",
                    id,
                    session.dataset_type,
                    session.received(),
                    session.total
                );
            }
            !expired
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Cleaned up {} expired sync sessions", removed);
        }
        removed
    }

    /// Runs [`Reassembler::sweep_expired`] every `interval` until the
    /// reassembler is dropped. Must be called within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(reassembler) = weak.upgrade() else {
                    break;
                };
                reassembler.sweep_expired();
            }
        })
    }

    fn remove(&self, session_id: &SessionId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }
}
