//! Stream Controller
//!
//! Owns at most one live response stream. Each `open` gets a new generation
//! number; the task behind it delivers a callback only while holding the
//! controller lock and only if its generation is still the live one, so a
//! superseded or closed stream can never reach its observer again, even if
//! the transport keeps producing events.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::StreamError;
use crate::state::StreamState;
use crate::transport::{FragmentStream, StreamTransport};

/// Reserved payload marking the end of a response
pub const DONE_SENTINEL: &str = "[DONE]";

/// Receives the callbacks of one stream.
///
/// After `on_done` or `on_error` no further callback is made.
pub trait StreamObserver: Send + 'static {
    fn on_fragment(&mut self, text: &str);
    fn on_done(&mut self);
    fn on_error(&mut self, error: &StreamError);
}

struct ActiveStream {
    generation: u64,
    state: StreamState,
    task: Option<JoinHandle<()>>,
}

impl ActiveStream {
    fn advance(&mut self, target: StreamState) {
        match self.state.transition(target) {
            Ok(next) => {
                if next != self.state {
                    tracing::debug!(
                        generation = self.generation,
                        from = %self.state,
                        to = %next,
                        "Stream state transition"
                    );
                }
                self.state = next;
            }
            Err(e) => {
                tracing::warn!(generation = self.generation, error = %e, "Ignored stream transition");
            }
        }
    }

    /// End a live stream from outside its task
    fn retire(&mut self, target: StreamState) {
        if self.state.is_terminal() {
            return;
        }
        self.advance(target);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Default)]
struct Slot {
    current: Option<ActiveStream>,
    last_generation: u64,
}

impl Slot {
    /// The stream for `generation`, if it is still the live one
    fn live(&mut self, generation: u64) -> Option<&mut ActiveStream> {
        self.current
            .as_mut()
            .filter(|s| s.generation == generation && !s.state.is_terminal())
    }
}

pub struct StreamController {
    transport: Arc<dyn StreamTransport>,
    slot: Arc<Mutex<Slot>>,
}

impl StreamController {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Open a stream for `request_text`, superseding any live one.
    ///
    /// The stream runs on the current tokio runtime. Without one it fails
    /// at once through `on_error`. Returns the generation number of the new
    /// stream.
    pub fn open<O: StreamObserver>(&self, request_text: &str, mut observer: O) -> u64 {
        let mut slot = self.slot.lock();

        if let Some(previous) = slot.current.as_mut() {
            if !previous.state.is_terminal() {
                tracing::info!(generation = previous.generation, "Superseding live stream");
            }
            previous.retire(StreamState::Superseded);
        }

        slot.last_generation += 1;
        let generation = slot.last_generation;

        let mut stream = ActiveStream {
            generation,
            state: StreamState::Idle,
            task: None,
        };
        stream.advance(StreamState::Connecting);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let error = StreamError::NoRuntime;
                stream.advance(StreamState::Failed);
                slot.current = Some(stream);
                tracing::warn!(generation, reason = %e, "Response stream failed");
                observer.on_error(&error);
                return generation;
            }
        };

        let connect = self.transport.connect(request_text);
        let task = runtime.spawn(run_stream(
            Arc::clone(&self.slot),
            generation,
            connect,
            observer,
        ));
        stream.task = Some(task);
        slot.current = Some(stream);

        tracing::info!(generation, "Opened response stream");

        generation
    }

    /// Close the live stream, if any. Returns whether one was closed.
    pub fn close(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.current.as_mut() {
            Some(stream) if !stream.state.is_terminal() => {
                stream.retire(StreamState::Cancelled);
                tracing::info!(generation = stream.generation, "Closed response stream");
                true
            }
            _ => false,
        }
    }

    /// State of the most recently opened stream
    pub fn state(&self) -> StreamState {
        self.slot
            .lock()
            .current
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(StreamState::Idle)
    }

    /// Generation of the most recently opened stream, 0 before the first
    pub fn generation(&self) -> u64 {
        self.slot.lock().last_generation
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_stream<O: StreamObserver>(
    slot: Arc<Mutex<Slot>>,
    generation: u64,
    connect: BoxFuture<'static, crate::Result<FragmentStream>>,
    mut observer: O,
) {
    let mut fragments = match connect.await {
        Ok(fragments) => fragments,
        Err(e) => {
            fail(&slot, generation, &mut observer, e);
            return;
        }
    };

    while let Some(item) = fragments.next().await {
        match item {
            Ok(data) if data == DONE_SENTINEL => break,
            Ok(data) => {
                let mut guard = slot.lock();
                let Some(stream) = guard.live(generation) else {
                    return;
                };
                stream.advance(StreamState::Streaming);
                tracing::debug!(generation, len = data.len(), "Stream fragment");
                observer.on_fragment(&data);
            }
            Err(e) => {
                fail(&slot, generation, &mut observer, e);
                return;
            }
        }
    }

    // Dropping the stream closes the connection before observers hear about it
    drop(fragments);

    let mut guard = slot.lock();
    let Some(stream) = guard.live(generation) else {
        return;
    };
    stream.advance(StreamState::Completed);
    stream.task = None;
    tracing::info!(generation, "Response stream completed");
    observer.on_done();
}

fn fail<O: StreamObserver>(
    slot: &Mutex<Slot>,
    generation: u64,
    observer: &mut O,
    error: StreamError,
) {
    let mut guard = slot.lock();
    let Some(stream) = guard.live(generation) else {
        return;
    };
    stream.advance(StreamState::Failed);
    stream.task = None;
    tracing::warn!(generation, error = %error, "Response stream failed");
    observer.on_error(&error);
}
