//! crates/study_planner_core/src/store.rs
//!
//! Client-side copy of the user's calendar. Optimistic writes land here first;
//! [`SessionStore::reconcile`] is the single place where server state is merged
//! back in.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::StudySession;

/// Whether the server is known to hold a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    /// The create request failed; the session only exists locally.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub session: StudySession,
    pub sync: SyncState,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    entries: Vec<StoredSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[StoredSession] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces a session by id.
    pub fn upsert(&mut self, session: StudySession, sync: SyncState) {
        match self.entries.iter_mut().find(|e| e.session.id == session.id) {
            Some(entry) => {
                entry.session = session;
                entry.sync = sync;
            }
            None => self.entries.push(StoredSession { session, sync }),
        }
        self.sort();
    }

    pub fn remove(&mut self, session_id: Uuid) -> Option<StoredSession> {
        let index = self.entries.iter().position(|e| e.session.id == session_id)?;
        Some(self.entries.remove(index))
    }

    /// Entries whose start date is `today` or later.
    pub fn from_date(&self, today: NaiveDate) -> Vec<StoredSession> {
        self.entries
            .iter()
            .filter(|e| e.session.start_time.date_naive() >= today)
            .cloned()
            .collect()
    }

    /// Merges the server's session list over local state.
    ///
    /// Every synced entry is replaced by the server list. Local-only entries
    /// are kept unless the server now holds a session with the same subject
    /// and start time.
    pub fn reconcile(&mut self, server_sessions: Vec<StudySession>) {
        let local_only: Vec<StoredSession> = self
            .entries
            .drain(..)
            .filter(|e| e.sync == SyncState::LocalOnly)
            .filter(|e| {
                !server_sessions.iter().any(|s| {
                    s.subject == e.session.subject && s.start_time == e.session.start_time
                })
            })
            .collect();

        self.entries = server_sessions
            .into_iter()
            .map(|session| StoredSession {
                session,
                sync: SyncState::Synced,
            })
            .chain(local_only)
            .collect();
        self.sort();
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.session.start_time);
    }
}
