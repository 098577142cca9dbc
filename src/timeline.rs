// ABOUTME: Message timeline — the append-only ordered log of a conversation.
// ABOUTME: Owns message ids, status transitions, and the single typing placeholder.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Unique, monotonically increasing message identifier. Never reused,
/// including across `clear()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User,
    Assistant,
    System,
}

/// Message content: plain text, a rich payload (summary text and/or a
/// tabular HTML fragment from the assistant endpoint), or the ephemeral
/// typing placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Rich {
        summary: Option<String>,
        table: Option<String>,
    },
    Typing,
}

impl Body {
    /// Convenience constructor for a plain-text body.
    pub fn text(s: impl Into<String>) -> Self {
        Body::Text(s.into())
    }

    /// A body is empty when it carries no displayable content at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Text(t) => t.trim().is_empty(),
            Body::Rich { summary, table } => {
                summary.as_deref().is_none_or(|s| s.trim().is_empty())
                    && table.as_deref().is_none_or(|t| t.trim().is_empty())
            }
            Body::Typing => false,
        }
    }

    /// Number of characters of user-visible text, for length validation.
    fn char_len(&self) -> usize {
        match self {
            Body::Text(t) => t.chars().count(),
            Body::Rich { summary, .. } => {
                summary.as_deref().map(|s| s.chars().count()).unwrap_or(0)
            }
            Body::Typing => 0,
        }
    }
}

/// Delivery status of a message. Immutable messages transition
/// Sent → Delivered or Sent → Failed, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Sent,
    Delivered,
    Failed,
}

/// A single timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub body: Body,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    /// Whether this entry is the typing placeholder.
    pub fn is_typing(&self) -> bool {
        matches!(self.body, Body::Typing)
    }
}

/// Errors for misuse of the timeline contract. These indicate an
/// integration bug and are fatal to the call, never swallowed.
#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),
}

/// Append-only ordered log of conversation messages. Insertion order is
/// conversation order; no reordering and no in-place edits except the
/// status transition and the ephemeral typing placeholder. At most one
/// placeholder exists at a time, always the last entry while present.
#[derive(Debug)]
pub struct Timeline {
    entries: Vec<Message>,
    next_id: u64,
    greeting: String,
    max_user_len: usize,
}

impl Timeline {
    /// Create a timeline seeded with the greeting message.
    pub fn new(greeting: impl Into<String>, max_user_len: usize) -> Self {
        let mut timeline = Self {
            entries: Vec::new(),
            next_id: 0,
            greeting: greeting.into(),
            max_user_len,
        };
        timeline.push_greeting();
        timeline
    }

    fn mint_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push_greeting(&mut self) {
        let id = self.mint_id();
        let greeting = self.greeting.clone();
        self.entries.push(Message {
            id,
            author: Author::Assistant,
            body: Body::Text(greeting),
            created_at: Utc::now(),
            status: MessageStatus::Delivered,
        });
    }

    /// Append a message at the tail (ahead of the typing placeholder when
    /// one is present, keeping the placeholder last).
    ///
    /// Fails with `InvalidMessage` when the body is empty, or — for
    /// user-authored messages only — longer than the configured maximum.
    pub fn append(&mut self, author: Author, body: Body) -> Result<MessageId, TimelineError> {
        if matches!(body, Body::Typing) {
            return Err(TimelineError::InvalidMessage(
                "typing placeholder must go through set_typing".to_string(),
            ));
        }
        if body.is_empty() {
            return Err(TimelineError::InvalidMessage(
                "message body is empty".to_string(),
            ));
        }
        if author == Author::User && body.char_len() > self.max_user_len {
            return Err(TimelineError::InvalidMessage(format!(
                "message exceeds {} characters",
                self.max_user_len
            )));
        }

        let id = self.mint_id();
        let status = match author {
            Author::User => MessageStatus::Sent,
            Author::Assistant | Author::System => MessageStatus::Delivered,
        };
        let message = Message {
            id,
            author,
            body,
            created_at: Utc::now(),
            status,
        };

        // Keep the typing placeholder as the last entry.
        match self.typing_index() {
            Some(idx) => self.entries.insert(idx, message),
            None => self.entries.push(message),
        }
        Ok(id)
    }

    /// Idempotently insert or remove the single typing placeholder.
    /// Inserting while one exists is a no-op, as is removing when absent.
    pub fn set_typing(&mut self, active: bool) {
        match (active, self.typing_index()) {
            (true, None) => {
                let id = self.mint_id();
                self.entries.push(Message {
                    id,
                    author: Author::Assistant,
                    body: Body::Typing,
                    created_at: Utc::now(),
                    status: MessageStatus::Delivered,
                });
            }
            (false, Some(idx)) => {
                self.entries.remove(idx);
            }
            _ => {}
        }
    }

    /// Whether the typing placeholder is currently present.
    pub fn is_typing(&self) -> bool {
        self.typing_index().is_some()
    }

    fn typing_index(&self) -> Option<usize> {
        self.entries.iter().position(Message::is_typing)
    }

    /// Transition a message's status. Fails with `UnknownMessage` when the
    /// id is not present.
    pub fn mark_status(
        &mut self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), TimelineError> {
        let msg = self
            .entries
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(TimelineError::UnknownMessage(id))?;
        msg.status = status;
        Ok(())
    }

    /// Remove all history and reseed a fresh greeting message. The only
    /// operation that deletes entries; ids keep incrementing.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.push_greeting();
    }

    /// Point-in-time copy of the timeline, safe to hand to a render
    /// surface. Read-only and side-effect free.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.clone()
    }

    /// Number of entries, including the typing placeholder when present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Update the user-message length limit (used by reconfigure).
    pub fn set_max_user_len(&mut self, max: usize) {
        self.max_user_len = max;
    }

    /// Update the greeting used by future `clear()` calls (used by
    /// reconfigure). Existing entries are untouched.
    pub fn set_greeting(&mut self, greeting: impl Into<String>) {
        self.greeting = greeting.into();
    }
}
