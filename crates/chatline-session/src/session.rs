//! Conversation session data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Title given to new sessions; replaced by the first user message
pub const DEFAULT_TITLE: &str = "新对话";

/// Longest derived title, in characters, before an ellipsis is added
pub const TITLE_MAX_CHARS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Transcript in chronological order
    pub messages: Vec<Message>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last activity; sole key for recency ordering
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the title is still eligible for derivation
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Rename the session; blank input restores the default title
    pub fn rename(&mut self, title: &str, now: DateTime<Utc>) {
        let title = title.trim();
        self.title = if title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title.to_string()
        };
        self.touch(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Append a user message and its assistant placeholder in one step
    pub(crate) fn push_turn(
        &mut self,
        user: Message,
        assistant: Message,
        title_max_chars: usize,
        now: DateTime<Utc>,
    ) {
        if self.has_default_title() {
            self.title = derive_title(&user.content, title_max_chars);
        }
        self.messages.push(user);
        self.messages.push(assistant);
        self.touch(now);
    }

    /// Append text to a message; false if the message is gone
    pub(crate) fn append_to_message(
        &mut self,
        message_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.append(text);
        self.touch(now);
        true
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Derive a display title from message text.
///
/// Whitespace runs collapse to one space; text over `max_chars` characters is
/// cut and suffixed with an ellipsis.
pub fn derive_title(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    if collapsed.chars().count() > max_chars {
        let mut title: String = collapsed.chars().take(max_chars).collect();
        title.push('…');
        title
    } else {
        collapsed
    }
}
