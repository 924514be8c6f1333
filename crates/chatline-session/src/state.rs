//! Durable unit of session state

use serde::{Deserialize, Serialize};

use crate::session::ChatSession;

/// Active pointer plus every session, in storage order.
///
/// New sessions sit at the front so that recency ties resolve newest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    pub active_id: Option<String>,
    pub sessions: Vec<ChatSession>,
}

impl StoredState {
    pub fn new(active_id: Option<String>, sessions: Vec<ChatSession>) -> Self {
        Self {
            active_id,
            sessions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub(crate) fn session_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.session(id).is_some()
    }

    /// Sessions ordered by `updated_at` descending, ties in storage order
    pub fn ordered(&self) -> Vec<&ChatSession> {
        let mut ordered: Vec<&ChatSession> = self.sessions.iter().collect();
        ordered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        ordered
    }

    pub fn most_recent(&self) -> Option<&ChatSession> {
        self.ordered().into_iter().next()
    }

    /// The active session, if the pointer is set and valid
    pub fn active(&self) -> Option<&ChatSession> {
        self.active_id.as_deref().and_then(|id| self.session(id))
    }
}
