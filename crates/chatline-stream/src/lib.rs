//! Chatline Response Streaming
//!
//! Assistant replies arrive as a stream of text fragments. At most one stream
//! is live at a time: opening a new one supersedes the previous one, whose
//! callbacks never fire again.

mod channel;
mod controller;
mod error;
mod sse;
mod state;
mod transport;

pub use channel::ChannelTransport;
pub use controller::{StreamController, StreamObserver, DONE_SENTINEL};
pub use error::StreamError;
pub use sse::{data_events, SseParser};
pub use state::StreamState;
pub use transport::{FragmentStream, SseTransport, StreamTransport};

pub type Result<T> = std::result::Result<T, StreamError>;
