//! Session cache: one live pipeline per session id.
//!
//! A frontend that re-renders with the same inputs gets its existing pipeline
//! (and its step log) back. New inputs, detected through a fingerprint of the
//! arguments, start a fresh pipeline.

use crate::pipeline::Pipeline;
use crate::state::State;
use indexmap::IndexMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

/// A pipeline shared between concurrent callers.
pub type SharedPipeline = Arc<Mutex<Pipeline>>;

#[derive(Debug)]
struct Session {
    fingerprint: u64,
    pipeline: SharedPipeline,
}

/// Pipelines keyed by session id.
#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: Mutex<IndexMap<String, Session>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's pipeline if its fingerprint still matches; otherwise a
    /// new one built by `init`, replacing any stale entry.
    pub fn get_or_create(
        &self,
        key: &str,
        fingerprint: u64,
        init: impl FnOnce() -> Pipeline,
    ) -> SharedPipeline {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get(key) {
            if session.fingerprint == fingerprint {
                return Arc::clone(&session.pipeline);
            }
            tracing::debug!(session = key, "arguments changed, rebuilding session");
        }

        let pipeline = Arc::new(Mutex::new(init()));
        sessions.insert(
            key.to_string(),
            Session {
                fingerprint,
                pipeline: Arc::clone(&pipeline),
            },
        );
        pipeline
    }

    /// Drop a session. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().shift_remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Hash of a state's serialized form, for use as a session fingerprint.
pub fn fingerprint_state(state: &State) -> u64 {
    let mut hasher = DefaultHasher::new();
    match serde_json::to_string(state) {
        Ok(json) => json.hash(&mut hasher),
        // Non-finite floats do not serialize; fall back to the debug form.
        Err(_) => format!("{state:?}").hash(&mut hasher),
    }
    hasher.finish()
}
