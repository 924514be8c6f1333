//! Session Store
//!
//! Canonical owner of every session and the active pointer. All operations
//! are synchronous and complete before returning, so a reader holding the
//! store never sees a half-applied turn.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::ids::{IdGenerator, UuidIds};
use crate::message::Message;
use crate::session::{ChatSession, TITLE_MAX_CHARS};
use crate::state::StoredState;

pub struct SessionStore {
    state: StoredState,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    title_max_chars: usize,
}

impl SessionStore {
    /// Empty store; call `bootstrap` before use
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: StoredState::default(),
            ids,
            clock,
            title_max_chars: TITLE_MAX_CHARS,
        }
    }

    pub fn with_title_max_chars(mut self, title_max_chars: usize) -> Self {
        self.title_max_chars = title_max_chars;
        self
    }

    /// Restore a loaded state, or start over with one fresh session.
    ///
    /// An empty or missing state counts as no prior state.
    pub fn bootstrap(&mut self, loaded: Option<StoredState>) {
        match loaded {
            Some(state) if !state.is_empty() => self.restore(state),
            _ => {
                let session = self.fresh_session();
                tracing::info!(session_id = %session.id, "Bootstrapped fresh session");
                self.state = StoredState::new(Some(session.id.clone()), vec![session]);
            }
        }
    }

    fn restore(&mut self, mut state: StoredState) {
        let mut seen = HashSet::new();
        let before = state.sessions.len();
        state.sessions.retain(|s| seen.insert(s.id.clone()));
        if state.sessions.len() < before {
            tracing::warn!(
                dropped = before - state.sessions.len(),
                "Dropped restored sessions with duplicate ids"
            );
        }

        let active_valid = state
            .active_id
            .as_deref()
            .is_some_and(|id| state.contains(id));

        if !active_valid {
            let fallback = state.most_recent().map(|s| s.id.clone());
            tracing::debug!(
                stale = ?state.active_id,
                fallback = ?fallback,
                "Restored state had no valid active session"
            );
            state.active_id = fallback;
        }

        tracing::info!(
            session_count = state.sessions.len(),
            active_id = ?state.active_id,
            "Restored sessions"
        );
        self.state = state;
    }

    pub fn state(&self) -> &StoredState {
        &self.state
    }

    pub fn snapshot(&self) -> StoredState {
        self.state.clone()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.state.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.state.active()
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.state.session(id)
    }

    pub fn ordered(&self) -> Vec<&ChatSession> {
        self.state.ordered()
    }

    pub fn len(&self) -> usize {
        self.state.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Create a new empty session and make it active
    pub fn create(&mut self) -> ChatSession {
        let session = self.fresh_session();
        self.state.sessions.insert(0, session.clone());
        self.state.active_id = Some(session.id.clone());

        tracing::info!(session_id = %session.id, "Created new session");

        session
    }

    /// Rename a session; `None` if the id is unknown
    pub fn rename(&mut self, id: &str, title: &str) -> Option<ChatSession> {
        let now = self.now();
        let session = self.state.session_mut(id)?;
        session.rename(title, now);
        Some(session.clone())
    }

    /// Remove a session, keeping the collection non-empty and the active
    /// pointer valid. Returns the removed session.
    pub fn delete(&mut self, id: &str) -> Option<ChatSession> {
        let index = self.state.sessions.iter().position(|s| s.id == id)?;
        let removed = self.state.sessions.remove(index);

        if self.state.sessions.is_empty() {
            let session = self.fresh_session();
            self.state.active_id = Some(session.id.clone());
            self.state.sessions.push(session);
        } else if self.state.active_id.as_deref() == Some(id) {
            self.state.active_id = self.state.most_recent().map(|s| s.id.clone());
        }

        tracing::info!(
            session_id = %id,
            active_id = ?self.state.active_id,
            "Deleted session"
        );

        Some(removed)
    }

    /// Discard everything and start over with one fresh active session
    pub fn clear_all(&mut self) -> ChatSession {
        let session = self.fresh_session();
        let discarded = self.state.sessions.len();
        self.state = StoredState::new(Some(session.id.clone()), vec![session.clone()]);

        tracing::info!(discarded, session_id = %session.id, "Cleared all sessions");

        session
    }

    /// Move the active pointer; false if the id is unknown
    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.state.contains(id) {
            return false;
        }
        self.state.active_id = Some(id.to_string());
        true
    }

    /// Bump a session's recency without any other change
    pub fn touch(&mut self, id: &str) -> bool {
        let now = self.now();
        match self.state.session_mut(id) {
            Some(session) => {
                session.touch(now);
                true
            }
            None => false,
        }
    }

    /// Append a user message plus an empty assistant placeholder.
    ///
    /// Returns the placeholder id that stream fragments are applied to, or
    /// `None` if the session does not exist.
    pub fn append_turn(&mut self, session_id: &str, user_text: &str) -> Option<String> {
        if !self.state.contains(session_id) {
            return None;
        }

        let now = self.now();
        let user = Message::user(self.ids.next_id(), user_text.to_string(), now);
        let assistant_id = self.ids.next_id();
        let assistant = Message::assistant_placeholder(assistant_id.clone(), now);

        let title_max_chars = self.title_max_chars;
        let session = self.state.session_mut(session_id)?;
        session.push_turn(user, assistant, title_max_chars, now);

        tracing::debug!(
            session_id = %session_id,
            assistant_id = %assistant_id,
            "Appended turn"
        );

        Some(assistant_id)
    }

    /// Append streamed text to a message. Unknown session or message ids are
    /// ignored, since a session may be deleted while its stream is live.
    pub fn append_fragment(&mut self, session_id: &str, message_id: &str, text: &str) -> bool {
        let now = self.now();
        let Some(session) = self.state.session_mut(session_id) else {
            return false;
        };
        session.append_to_message(message_id, text, now)
    }

    fn fresh_session(&self) -> ChatSession {
        ChatSession::new(self.ids.next_id(), self.now())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(UuidIds), Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ids::SequentialIds;
    use crate::message::Role;
    use crate::session::DEFAULT_TITLE;
    use chrono::Duration;

    fn test_store() -> SessionStore {
        let clock = ManualClock::new(Utc::now(), Duration::milliseconds(1));
        let mut store = SessionStore::new(Arc::new(SequentialIds::new("id")), Arc::new(clock));
        store.bootstrap(None);
        store
    }

    fn assert_invariants(store: &SessionStore) {
        assert!(!store.is_empty());
        let active = store.active_id().unwrap();
        assert!(store.get(active).is_some());
    }

    #[test]
    fn test_bootstrap_empty() {
        let store = test_store();
        assert_eq!(store.len(), 1);
        let active = store.active().unwrap();
        assert_eq!(active.title, DEFAULT_TITLE);
        assert!(active.messages.is_empty());
    }

    #[test]
    fn test_bootstrap_restores_and_repairs_active() {
        let now = Utc::now();
        let older = ChatSession::new("older".to_string(), now);
        let mut newer = ChatSession::new("newer".to_string(), now);
        newer.touch(now + Duration::seconds(3));
        let loaded = StoredState::new(Some("missing".to_string()), vec![older, newer]);

        let mut store = SessionStore::default();
        store.bootstrap(Some(loaded));

        assert_eq!(store.len(), 2);
        assert_eq!(store.active_id(), Some("newer"));
    }

    #[test]
    fn test_bootstrap_drops_duplicate_ids() {
        let now = Utc::now();
        let mut first = ChatSession::new("dup".to_string(), now);
        first.rename("kept", now);
        let second = ChatSession::new("dup".to_string(), now);
        let other = ChatSession::new("other".to_string(), now);
        let loaded = StoredState::new(Some("dup".to_string()), vec![first, second, other]);

        let mut store = SessionStore::default();
        store.bootstrap(Some(loaded));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("dup").unwrap().title, "kept");
        assert_eq!(store.active_id(), Some("dup"));

        assert!(store.delete("dup").is_some());
        assert!(store.get("dup").is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), Some("other"));
        assert_invariants(&store);
    }

    #[test]
    fn test_bootstrap_ignores_empty_state() {
        let mut store = SessionStore::default();
        store.bootstrap(Some(StoredState::new(Some("x".to_string()), Vec::new())));
        assert_eq!(store.len(), 1);
        assert_invariants(&store);
    }

    #[test]
    fn test_create_ids_unique_and_active() {
        let mut store = test_store();
        let mut seen = HashSet::new();
        seen.insert(store.active_id().unwrap().to_string());

        for _ in 0..20 {
            let session = store.create();
            assert_eq!(store.active_id(), Some(session.id.as_str()));
            assert!(seen.insert(session.id));
        }
        assert_eq!(store.len(), 21);
    }

    #[test]
    fn test_newest_session_listed_first() {
        let clock = ManualClock::new(Utc::now(), Duration::zero());
        let mut store = SessionStore::new(Arc::new(SequentialIds::new("id")), Arc::new(clock));
        store.bootstrap(None);
        let first = store.active_id().unwrap().to_string();
        let second = store.create();

        let ids: Vec<&str> = store.ordered().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.as_str()]);
    }

    #[test]
    fn test_rename() {
        let mut store = test_store();
        let id = store.active_id().unwrap().to_string();
        let before = store.get(&id).unwrap().updated_at;

        let renamed = store.rename(&id, "  Work  ").unwrap();
        assert_eq!(renamed.title, "Work");
        assert!(renamed.updated_at > before);

        let renamed = store.rename(&id, "\t").unwrap();
        assert_eq!(renamed.title, DEFAULT_TITLE);

        assert!(store.rename("unknown", "x").is_none());
    }

    #[test]
    fn test_delete_active_moves_to_most_recent() {
        let mut store = test_store();
        let a = store.active_id().unwrap().to_string();
        let b = store.create().id;
        let c = store.create().id;
        store.touch(&a);

        assert!(store.delete(&c).is_some());
        assert_eq!(store.active_id(), Some(a.as_str()));
        assert!(store.get(&b).is_some());
        assert_invariants(&store);
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let mut store = test_store();
        let a = store.active_id().unwrap().to_string();
        let b = store.create().id;

        store.delete(&a).unwrap();
        assert_eq!(store.active_id(), Some(b.as_str()));
        assert!(store.delete("unknown").is_none());
    }

    #[test]
    fn test_delete_last_session_synthesizes_fresh() {
        let mut store = test_store();
        let only = store.active_id().unwrap().to_string();

        store.delete(&only).unwrap();

        assert_eq!(store.len(), 1);
        let active = store.active().unwrap();
        assert_ne!(active.id, only);
        assert_eq!(active.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_invariants_hold_across_deletes_and_clears() {
        let mut store = test_store();
        for round in 0..5 {
            let ids: Vec<String> = (0..round).map(|_| store.create().id).collect();
            for id in &ids {
                store.delete(id);
                assert_invariants(&store);
            }
            let active = store.active_id().unwrap().to_string();
            store.delete(&active);
            assert_invariants(&store);

            store.create();
            store.clear_all();
            assert_eq!(store.len(), 1);
            assert_invariants(&store);
        }
    }

    #[test]
    fn test_set_active_does_not_touch() {
        let mut store = test_store();
        let a = store.active_id().unwrap().to_string();
        store.create();
        let before = store.get(&a).unwrap().updated_at;

        assert!(store.set_active(&a));
        assert_eq!(store.active_id(), Some(a.as_str()));
        assert_eq!(store.get(&a).unwrap().updated_at, before);

        assert!(!store.set_active("unknown"));
        assert_eq!(store.active_id(), Some(a.as_str()));
    }

    #[test]
    fn test_append_turn_and_fragments() {
        let mut store = test_store();
        let id = store.active_id().unwrap().to_string();

        let assistant_id = store.append_turn(&id, "hi there").unwrap();
        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "hi there");
        assert_eq!(session.messages[1].id, assistant_id);
        assert!(session.messages[1].content.is_empty());
        assert_eq!(session.title, "hi there");

        for fragment in ["Hel", "lo", ", world"] {
            assert!(store.append_fragment(&id, &assistant_id, fragment));
        }
        let message = store.get(&id).unwrap().message(&assistant_id).unwrap();
        assert_eq!(message.content, "Hello, world");
    }

    #[test]
    fn test_title_not_overwritten() {
        let mut store = test_store();
        let id = store.active_id().unwrap().to_string();

        store.append_turn(&id, "first").unwrap();
        store.append_turn(&id, "second").unwrap();
        assert_eq!(store.get(&id).unwrap().title, "first");

        let other = store.create().id;
        store.rename(&other, "Chosen").unwrap();
        store.append_turn(&other, "question").unwrap();
        assert_eq!(store.get(&other).unwrap().title, "Chosen");
    }

    #[test]
    fn test_fragment_for_deleted_session_ignored() {
        let mut store = test_store();
        let id = store.active_id().unwrap().to_string();
        let assistant_id = store.append_turn(&id, "question").unwrap();

        store.delete(&id).unwrap();

        let replacement = store.active_id().unwrap().to_string();
        assert!(!store.append_fragment(&id, &assistant_id, "late"));
        assert!(!store.append_fragment(&replacement, &assistant_id, "late"));
        assert!(store.append_turn("gone", "text").is_none());
    }
}
