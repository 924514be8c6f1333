//! Stream State Machine
//!
//! ```text
//! Idle
//!   ↓ open
//! Connecting
//!   ↓ first fragment
//! Streaming ⟲ fragment
//!   ↓ [DONE] / end of body      ↓ transport error   ↓ newer open   ↓ close
//! Completed                     Failed              Superseded     Cancelled
//! ```
//! Every state after `Streaming` is terminal and is also reachable directly
//! from `Connecting`.

use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream has been opened
    Idle,
    /// Request sent, no fragment yet
    Connecting,
    /// At least one fragment delivered
    Streaming,
    /// Ended by the done sentinel or by the connection closing cleanly
    Completed,
    /// Ended by a transport error
    Failed,
    /// Replaced by a newer stream
    Superseded,
    /// Closed explicitly
    Cancelled,
}

impl StreamState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: StreamState) -> bool {
        use StreamState::*;

        match (self, target) {
            (Idle, Connecting) => true,
            (Connecting, Streaming) => true,
            (Streaming, Streaming) => true,
            (Connecting | Streaming, Completed | Failed | Superseded | Cancelled) => true,
            _ => false,
        }
    }

    pub fn transition(self, target: StreamState) -> Result<StreamState, StreamError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(StreamError::InvalidTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Connecting or streaming
    pub fn is_active(&self) -> bool {
        matches!(self, StreamState::Connecting | StreamState::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed
                | StreamState::Failed
                | StreamState::Superseded
                | StreamState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Connecting => "connecting",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Failed => "failed",
            StreamState::Superseded => "superseded",
            StreamState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(StreamState::Idle.can_transition_to(StreamState::Connecting));
        assert!(StreamState::Connecting.can_transition_to(StreamState::Streaming));
        assert!(StreamState::Streaming.can_transition_to(StreamState::Streaming));
        assert!(StreamState::Streaming.can_transition_to(StreamState::Completed));
        assert!(StreamState::Streaming.can_transition_to(StreamState::Failed));
        assert!(StreamState::Connecting.can_transition_to(StreamState::Superseded));
        assert!(StreamState::Connecting.can_transition_to(StreamState::Completed));
    }

    #[test]
    fn test_invalid_transitions() {
        // Can't skip connecting
        assert!(!StreamState::Idle.can_transition_to(StreamState::Streaming));
        // Terminal states stay terminal
        assert!(!StreamState::Completed.can_transition_to(StreamState::Streaming));
        assert!(!StreamState::Failed.can_transition_to(StreamState::Completed));
        assert!(!StreamState::Superseded.can_transition_to(StreamState::Connecting));
        assert!(!StreamState::Connecting.can_transition_to(StreamState::Connecting));
    }

    #[test]
    fn test_transition_error() {
        let err = StreamState::Completed
            .transition(StreamState::Streaming)
            .unwrap_err();
        assert_eq!(
            err,
            StreamError::InvalidTransition {
                from: "completed".to_string(),
                to: "streaming".to_string(),
            }
        );
        assert!(StreamState::Cancelled.is_terminal());
        assert!(StreamState::Streaming.is_active());
        assert!(!StreamState::Idle.is_active());
    }
}
