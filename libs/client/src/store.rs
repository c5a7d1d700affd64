//! Token store holding the current session
//!
//! The store only supports whole-value replacement and clearing. Partial
//! updates are deliberately absent so a stale or mismatched token triple can
//! never be observed.

use chrono::{DateTime, Utc};
use common::session::Session;

/// Holder for the current session, if any
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    current: Option<Session>,
}

impl TokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently held session, if any
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Atomically replace the whole session
    pub fn replace(&mut self, session: Session) {
        self.current = Some(session);
    }

    /// Drop the session, e.g. on sign-out or irrecoverable auth failure
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// True iff a session is held and it is still valid at `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.current.as_ref().is_some_and(|s| s.is_valid(now))
    }
}
