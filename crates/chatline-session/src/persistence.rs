//! Persistence Adapter
//!
//! Serializes `StoredState` into a single named slot. Reads never fail:
//! missing, corrupt or unknown-version data loads as `None`. Writes report
//! errors, and callers are expected to log and carry on.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use chatline_storage::Database;

use crate::error::SessionError;
use crate::state::StoredState;
use crate::Result;

/// Schema version written alongside every snapshot
pub const STATE_VERSION: u32 = 1;

pub trait Persistence: Send + Sync {
    /// Last saved state, or `None` when nothing usable is stored
    fn load(&self) -> Option<StoredState>;

    fn save(&self, state: &StoredState) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<S> {
    version: u32,
    #[serde(flatten)]
    state: S,
}

pub fn encode_state(state: &StoredState) -> Result<String> {
    let envelope = Envelope {
        version: STATE_VERSION,
        state,
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode_state(raw: &str) -> Result<StoredState> {
    let envelope: Envelope<StoredState> = serde_json::from_str(raw)?;
    if envelope.version != STATE_VERSION {
        return Err(SessionError::UnsupportedVersion(envelope.version));
    }
    Ok(envelope.state)
}

fn decode_usable(raw: Option<String>, source: &str) -> Option<StoredState> {
    let raw = raw?;
    match decode_state(&raw) {
        Ok(state) if state.is_empty() => None,
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "Discarding unreadable session state");
            None
        }
    }
}

/// Snapshot stored in a SQLite slot
pub struct SlotPersistence {
    db: Database,
    key: String,
}

impl SlotPersistence {
    pub fn new(db: Database, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Persistence for SlotPersistence {
    fn load(&self) -> Option<StoredState> {
        let raw = match self.db.get_slot(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(slot = %self.key, error = %e, "Failed to read session slot");
                return None;
            }
        };
        decode_usable(raw, &self.key)
    }

    fn save(&self, state: &StoredState) -> Result<()> {
        let raw = encode_state(state)?;
        self.db.set_slot(&self.key, &raw)?;
        Ok(())
    }
}

impl Clone for SlotPersistence {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            key: self.key.clone(),
        }
    }
}

/// In-process slot, optionally refusing writes like a full or disabled store
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<String>>,
    reject_writes: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with raw slot contents, as if written by an earlier run
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
            reject_writes: AtomicBool::new(false),
        }
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Option<StoredState> {
        decode_usable(self.raw(), "memory")
    }

    fn save(&self, state: &StoredState) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Unavailable("writes rejected".to_string()));
        }
        let raw = encode_state(state)?;
        *self.slot.lock() = Some(raw);
        Ok(())
    }
}
