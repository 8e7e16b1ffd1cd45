//! Minimal per-session state, keyed by an externally supplied session
//! id. In-memory only — resets with the process.

use std::collections::HashMap;

use parking_lot::Mutex;

use memctl_core::now_iso;

/// Session id used when the front-end supplies none.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Snapshot of one session's state.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub created_at: String,
    pub turn_count: u64,
    pub writes_this_turn: u64,
}

/// In-memory session tracking.
#[derive(Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary: the caller-provided id. Fallback: the shared default.
    pub fn resolve_session_id(&self, external: Option<&str>) -> String {
        match external {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => DEFAULT_SESSION_ID.to_string(),
        }
    }

    /// Snapshot of a session, creating it on first touch.
    pub fn get_or_create(&self, session_id: &str) -> SessionState {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState {
                session_id: session_id.to_string(),
                created_at: now_iso(),
                turn_count: 0,
                writes_this_turn: 0,
            })
            .clone()
    }

    /// Advance the turn counter and clear per-turn counters.
    pub fn increment_turn(&self, session_id: &str) -> u64 {
        let mut sessions = self.sessions.lock();
        let state = sessions.entry(session_id.to_string()).or_insert_with(|| SessionState {
            session_id: session_id.to_string(),
            created_at: now_iso(),
            turn_count: 0,
            writes_this_turn: 0,
        });
        state.turn_count += 1;
        state.writes_this_turn = 0;
        state.turn_count
    }

    /// Record a write in the current turn.
    pub fn record_write(&self, session_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(state) = sessions.get_mut(session_id) {
            state.writes_this_turn += 1;
        }
    }

    /// Wipe a session entirely.
    pub fn reset(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}
