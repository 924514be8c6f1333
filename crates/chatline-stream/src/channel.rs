//! In-process transport fed through channels

use std::collections::VecDeque;

use futures_util::future::BoxFuture;
use futures_util::stream;
use futures_util::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::transport::{FragmentStream, StreamTransport};
use crate::Result;

type Pending = Result<mpsc::UnboundedReceiver<Result<String>>>;

/// Transport whose responses are scripted ahead of time.
///
/// Each `connect` consumes the next scripted response in order. Payloads are
/// sent through the returned sender; dropping it ends the stream cleanly.
#[derive(Default)]
pub struct ChannelTransport {
    pending: Mutex<VecDeque<Pending>>,
    requests: Mutex<Vec<String>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next response and return its feed
    pub fn push_stream(&self) -> mpsc::UnboundedSender<Result<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().push_back(Ok(rx));
        tx
    }

    /// Script the next connection attempt to fail
    pub fn push_connect_error(&self, error: StreamError) {
        self.pending.lock().push_back(Err(error));
    }

    /// Request texts seen so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl StreamTransport for ChannelTransport {
    fn connect(&self, request_text: &str) -> BoxFuture<'static, Result<FragmentStream>> {
        self.requests.lock().push(request_text.to_string());
        let next = self
            .pending
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StreamError::Connect("no response scripted".to_string())));

        async move {
            let rx = next?;
            let fragments = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(fragments.boxed())
        }
        .boxed()
    }
}
