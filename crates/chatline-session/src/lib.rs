//! Chatline Session Management
//!
//! - A session is one conversation thread: a title plus an ordered transcript
//! - The store owns every session and the active-session pointer
//! - The collection is never empty once bootstrapped
//! - Snapshots are persisted after every committed mutation, best-effort

mod clock;
mod error;
mod ids;
mod message;
mod persistence;
mod session;
mod state;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use message::{Message, Role};
pub use persistence::{
    decode_state, encode_state, MemoryPersistence, Persistence, SlotPersistence, STATE_VERSION,
};
pub use session::{derive_title, ChatSession, DEFAULT_TITLE, TITLE_MAX_CHARS};
pub use state::StoredState;
pub use store::SessionStore;

pub type Result<T> = std::result::Result<T, SessionError>;
