//! Chatline Core
//!
//! Composition root for the chat client: one session store, one persistence
//! slot and one response stream, exposed to the presentation layer as
//! snapshot reads, change events and six operations.

mod config;
mod error;
mod events;
mod manager;

pub use config::Config;
pub use error::CoreError;
pub use events::{ChatEvent, EventBus};
pub use manager::ChatSessionManager;

// Re-export core components
pub use chatline_session::{
    ChatSession, Clock, IdGenerator, ManualClock, MemoryPersistence, Message, Persistence, Role,
    SequentialIds, SessionError, SessionStore, SlotPersistence, StoredState, SystemClock, UuidIds,
    DEFAULT_TITLE,
};
pub use chatline_storage::{Database, StorageError};
pub use chatline_stream::{
    ChannelTransport, SseTransport, StreamController, StreamError, StreamState, StreamTransport,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
