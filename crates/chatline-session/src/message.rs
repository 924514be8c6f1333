//! Transcript messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// One turn entry in a transcript.
///
/// Assistant content grows while its stream is live and is left as-is once
/// the stream terminates, including after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(id: String, role: Role, content: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            role,
            content,
            created_at,
        }
    }

    pub fn user(id: String, content: String, created_at: DateTime<Utc>) -> Self {
        Self::new(id, Role::User, content, created_at)
    }

    /// Empty assistant message that fragments are appended to
    pub fn assistant_placeholder(id: String, created_at: DateTime<Utc>) -> Self {
        Self::new(id, Role::Assistant, String::new(), created_at)
    }

    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
