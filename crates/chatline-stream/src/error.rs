//! Stream error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No async runtime to drive the stream")]
    NoRuntime,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
