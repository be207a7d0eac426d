//! Per-session result cache
//!
//! Each browser session owns one [`ResultCache`], keyed by tool, holding the
//! last successful artifact so it stays downloadable across page loads. A
//! per-tool generation counter is the identity of the tool's form widgets:
//! clearing bumps it, and form fields from an older generation are ignored.

use crate::tools::{Operation, ToolKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A successful artifact kept for download.
#[derive(Debug, Clone)]
pub struct StoredResult {
    pub operation: Operation,
    pub output_name: String,
    pub content_type: &'static str,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct ToolSlot {
    last: Option<StoredResult>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    slots: HashMap<ToolKind, ToolSlot>,
}

impl ResultCache {
    pub fn generation(&self, tool: ToolKind) -> u64 {
        self.slots.get(&tool).map_or(0, |s| s.generation)
    }

    pub fn last(&self, tool: ToolKind) -> Option<&StoredResult> {
        self.slots.get(&tool).and_then(|s| s.last.as_ref())
    }

    /// A new submission is starting; the previous result no longer applies.
    pub fn begin(&mut self, tool: ToolKind) {
        self.slots.entry(tool).or_default().last = None;
    }

    pub fn store(&mut self, tool: ToolKind, result: StoredResult) {
        self.slots.entry(tool).or_default().last = Some(result);
    }

    /// Forget the tool's result and start a new widget generation.
    ///
    /// Returns the new generation.
    pub fn clear(&mut self, tool: ToolKind) -> u64 {
        let slot = self.slots.entry(tool).or_default();
        slot.last = None;
        slot.generation += 1;
        slot.generation
    }
}

#[derive(Debug)]
struct Session {
    cache: ResultCache,
    last_seen: Instant,
}

/// All live sessions, kept in process memory only.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    idle: Duration,
}

impl SessionStore {
    pub fn new(idle: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle,
        }
    }

    /// Run `f` against the cache of session `id`, creating it if needed.
    ///
    /// Sessions idle for longer than the configured timeout are dropped first.
    pub fn with<R>(&self, id: Uuid, f: impl FnOnce(&mut ResultCache) -> R) -> R {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let idle = self.idle;
        sessions.retain(|sid, s| *sid == id || now.duration_since(s.last_seen) <= idle);

        let session = sessions.entry(id).or_insert_with(|| {
            tracing::debug!(session = %id, "session created");
            Session {
                cache: ResultCache::default(),
                last_seen: now,
            }
        });
        session.last_seen = now;
        f(&mut session.cache)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
