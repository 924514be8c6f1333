//! Change notifications for the presentation layer

use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Sessions, transcripts or the active pointer changed
    StateChanged,
    /// A stream started or ended
    LoadingChanged(bool),
    /// The last stream failed; partial content was kept
    StreamFailed(String),
}

/// Broadcast channel of `ChatEvent`s.
///
/// Publishing with no subscribers is a no-op. Slow subscribers may lag and
/// should re-read snapshots when they do.
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
