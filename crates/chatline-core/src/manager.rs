//! Chat Session Manager
//!
//! Wires the session store, its persistence slot and the response stream
//! into the surface the presentation layer consumes. Operations never fail:
//! rejected input and unknown ids are no-ops, persistence failures are logged
//! and the in-memory state stays authoritative.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use chatline_session::{
    ChatSession, Message, Persistence, SessionStore, SlotPersistence, StoredState,
};
use chatline_storage::Database;
use chatline_stream::{
    SseTransport, StreamController, StreamError, StreamObserver, StreamState, StreamTransport,
};

use crate::config::Config;
use crate::events::{ChatEvent, EventBus};
use crate::Result;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct StreamStatus {
    loading: bool,
    last_error: Option<String>,
}

/// Store operation results that tell whether anything changed
trait Mutation {
    fn changed(&self) -> bool;
}

impl Mutation for bool {
    fn changed(&self) -> bool {
        *self
    }
}

impl<T> Mutation for Option<T> {
    fn changed(&self) -> bool {
        self.is_some()
    }
}

impl Mutation for ChatSession {
    fn changed(&self) -> bool {
        true
    }
}

/// State shared with stream callbacks
struct Shared {
    store: RwLock<SessionStore>,
    persistence: Arc<dyn Persistence>,
    status: RwLock<StreamStatus>,
    events: EventBus,
    initialized: AtomicBool,
}

impl Shared {
    /// Apply a store operation and persist the result while still holding
    /// the write lock, so saved snapshots follow mutation order.
    fn mutate<T: Mutation>(&self, f: impl FnOnce(&mut SessionStore) -> T) -> T {
        let mut store = self.store.write();
        let outcome = f(&mut store);
        let changed = outcome.changed();
        if changed {
            self.persist(&store);
        }
        drop(store);

        if changed {
            self.events.publish(ChatEvent::StateChanged);
        }
        outcome
    }

    fn persist(&self, store: &SessionStore) {
        if let Err(e) = self.persistence.save(store.state()) {
            tracing::warn!(error = %e, "Failed to persist sessions, keeping in-memory state");
        }
    }

    fn finish_stream(&self, error: Option<String>) {
        {
            let mut status = self.status.write();
            status.loading = false;
            if error.is_some() {
                status.last_error = error.clone();
            }
        }

        self.events.publish(ChatEvent::LoadingChanged(false));
        if let Some(reason) = error {
            self.events.publish(ChatEvent::StreamFailed(reason));
        }
    }
}

/// Applies one stream's fragments to the assistant message it was opened for
struct ReplyWriter {
    shared: Arc<Shared>,
    session_id: String,
    assistant_id: String,
}

impl StreamObserver for ReplyWriter {
    fn on_fragment(&mut self, text: &str) {
        let applied = self
            .shared
            .mutate(|store| store.append_fragment(&self.session_id, &self.assistant_id, text));

        if !applied {
            tracing::debug!(
                session_id = %self.session_id,
                assistant_id = %self.assistant_id,
                "Dropped fragment for vanished message"
            );
        }
    }

    fn on_done(&mut self) {
        self.shared.finish_stream(None);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.shared.finish_stream(Some(error.to_string()));
    }
}

pub struct ChatSessionManager {
    shared: Arc<Shared>,
    streams: StreamController,
}

impl ChatSessionManager {
    pub fn new(persistence: Arc<dyn Persistence>, transport: Arc<dyn StreamTransport>) -> Self {
        Self::with_store(SessionStore::default(), persistence, transport)
    }

    /// Build around a prepared store, e.g. one with deterministic ids
    pub fn with_store(
        store: SessionStore,
        persistence: Arc<dyn Persistence>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(store),
                persistence,
                status: RwLock::new(StreamStatus::default()),
                events: EventBus::new(EVENT_CAPACITY),
                initialized: AtomicBool::new(false),
            }),
            streams: StreamController::new(transport),
        }
    }

    /// Open the database and endpoint named by `config`, then bootstrap
    pub fn open(config: &Config) -> Result<Self> {
        // Ensure data directory exists
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let endpoint = config.endpoint_url()?;
        let db = Database::open(&config.database_path)?;
        let persistence = SlotPersistence::new(db, config.storage_key.clone());
        let store = SessionStore::default().with_title_max_chars(config.title_max_chars);

        let manager = Self::with_store(
            store,
            Arc::new(persistence),
            Arc::new(SseTransport::new(endpoint)),
        );
        manager.initialize();

        Ok(manager)
    }

    /// Load persisted sessions or start with one fresh session. Runs once;
    /// later calls do nothing.
    pub fn initialize(&self) {
        let mut store = self.shared.store.write();
        if self.shared.initialized.load(Ordering::SeqCst) {
            return;
        }

        let loaded = self.shared.persistence.load();
        store.bootstrap(loaded);
        self.shared.initialized.store(true, Ordering::SeqCst);
        self.shared.persist(&store);
        drop(store);

        tracing::info!("Chat sessions initialized");
        self.shared.events.publish(ChatEvent::StateChanged);
    }

    // === Reactive state ===

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.events.subscribe()
    }

    /// Sessions, most recently updated first
    pub fn sessions(&self) -> Vec<ChatSession> {
        self.shared
            .store
            .read()
            .ordered()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn active_id(&self) -> Option<String> {
        self.shared.store.read().active_id().map(str::to_string)
    }

    pub fn active_session(&self) -> Option<ChatSession> {
        self.shared.store.read().active().cloned()
    }

    /// Transcript of the active session
    pub fn messages(&self) -> Vec<Message> {
        self.shared
            .store
            .read()
            .active()
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> StoredState {
        self.shared.store.read().snapshot()
    }

    /// True from `send_message` until its stream completes or fails
    pub fn loading(&self) -> bool {
        self.shared.status.read().loading
    }

    /// Reason the most recent stream failed, cleared by the next send
    pub fn last_error(&self) -> Option<String> {
        self.shared.status.read().last_error.clone()
    }

    pub fn stream_state(&self) -> StreamState {
        self.streams.state()
    }

    // === Session operations ===

    pub fn new_session(&self) -> ChatSession {
        self.initialize();
        self.shared.mutate(|store| store.create())
    }

    pub fn rename_session(&self, id: &str, title: &str) -> bool {
        self.initialize();
        self.shared.mutate(|store| store.rename(id, title)).is_some()
    }

    pub fn delete_session(&self, id: &str) -> bool {
        self.initialize();
        self.shared.mutate(|store| store.delete(id)).is_some()
    }

    pub fn clear_all_sessions(&self) -> ChatSession {
        self.initialize();
        self.shared.mutate(|store| store.clear_all())
    }

    pub fn set_active_session(&self, id: &str) -> bool {
        self.initialize();
        self.shared.mutate(|store| store.set_active(id))
    }

    pub fn touch_session(&self, id: &str) -> bool {
        self.initialize();
        self.shared.mutate(|store| store.touch(id))
    }

    /// Send `text` in the active session and stream the reply into a new
    /// assistant message.
    ///
    /// Blank text, or a send while a reply is still loading, is ignored and
    /// returns false. The reply streams on the current tokio runtime; without
    /// one the turn is kept and the stream fails immediately.
    pub fn send_message(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.initialize();

        {
            let mut status = self.shared.status.write();
            if status.loading {
                tracing::debug!("Ignoring send while a reply is loading");
                return false;
            }
            status.loading = true;
            status.last_error = None;
        }

        let turn = self.shared.mutate(|store| {
            let session_id = match store.active_id() {
                Some(id) => id.to_string(),
                None => store.create().id,
            };
            store
                .append_turn(&session_id, text)
                .map(|assistant_id| (session_id, assistant_id))
        });

        let Some((session_id, assistant_id)) = turn else {
            self.shared.status.write().loading = false;
            return false;
        };

        self.shared.events.publish(ChatEvent::LoadingChanged(true));

        let writer = ReplyWriter {
            shared: Arc::clone(&self.shared),
            session_id: session_id.clone(),
            assistant_id: assistant_id.clone(),
        };
        let generation = self.streams.open(text, writer);

        tracing::info!(
            session_id = %session_id,
            assistant_id = %assistant_id,
            generation,
            "Sent message"
        );

        true
    }

    /// Close any live stream; a reply cut short keeps its partial content
    pub fn shutdown(&self) {
        if self.streams.close() {
            self.shared.finish_stream(None);
        }
    }
}

impl Drop for ChatSessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
