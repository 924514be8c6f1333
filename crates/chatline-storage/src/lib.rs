//! Chatline Storage Layer
//!
//! SQLite-backed durable storage. State is kept in named key-value slots,
//! each slot holding one serialized snapshot that is overwritten on save.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
