// ABOUTME: Chat session controller — the turn-taking state machine.
// ABOUTME: Guards the single in-flight exchange and applies resolutions to the timeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ChatConfig;
use crate::identity::SessionIdentity;
use crate::timeline::{Author, Body, Message, MessageId, MessageStatus, Timeline, TimelineError};
use crate::transport::{AskReply, TransportError};

/// Reply text starting with this prefix (case-insensitive) is treated as a
/// leaked backend error and replaced with the generic apology.
const INTERNAL_ERROR_SENTINEL: &str = "internal error";

/// Generic user-facing apology, used for sanitized and empty payloads and
/// as the lead-in of failure messages.
pub const APOLOGY: &str = "I'm sorry, I couldn't process your request. Please try again.";

/// Turn-taking status of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    /// No exchange outstanding; submissions are accepted.
    Idle,
    /// Exactly one exchange outstanding; submissions are rejected.
    AwaitingResponse,
}

/// The single in-flight request/response pairing.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    pub request_id: u64,
    pub user_message_id: MessageId,
    pub started_at: DateTime<Utc>,
    /// Timeline generation captured at request start. A resolution whose
    /// generation no longer matches is discarded.
    pub generation: u64,
}

/// Everything the runtime needs to dispatch one transport call. Returned
/// by a successful `submit`; the controller itself never touches the
/// network.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub request_id: u64,
    pub generation: u64,
    pub query: String,
    pub user_id: String,
    pub auth_token: String,
    pub delay: std::time::Duration,
}

/// Rejections of a submit attempt. All are recovered locally: the
/// controller state is unchanged and the conversation stays usable.
#[derive(Debug, Error, PartialEq)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("message exceeds {max} characters (got {len})")]
    TooLong { len: usize, max: usize },
    #[error("a previous message is still awaiting a response")]
    Busy,
    /// Timeline contract violation — an integration bug, not a user error.
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Read-only view of the session, handed to the render surface.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub status: ControllerStatus,
    pub show_quick_replies: bool,
}

/// The chat session state machine. Owns the timeline (single writer) and
/// the at-most-one pending exchange; all transitions are synchronous and
/// driven by discrete events (submit, resolution, clear, reconfigure).
pub struct ChatController {
    config: ChatConfig,
    identity: SessionIdentity,
    timeline: Timeline,
    pending: Option<PendingExchange>,
    generation: u64,
    next_request_id: u64,
    show_quick_replies: bool,
}

impl ChatController {
    /// Build a controller for one conversation. The timeline starts with
    /// the configured greeting.
    pub fn new(config: ChatConfig, identity: SessionIdentity) -> Self {
        let timeline = Timeline::new(&config.greeting, config.max_message_length);
        let show_quick_replies = config.enable_quick_replies;
        Self {
            config,
            identity,
            timeline,
            pending: None,
            generation: 0,
            next_request_id: 0,
            show_quick_replies,
        }
    }

    pub fn status(&self) -> ControllerStatus {
        if self.pending.is_some() {
            ControllerStatus::AwaitingResponse
        } else {
            ControllerStatus::Idle
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn pending_exchange(&self) -> Option<&PendingExchange> {
        self.pending.as_ref()
    }

    /// Point-in-time view for the render surface.
    pub fn view(&self) -> SessionView {
        SessionView {
            messages: self.timeline.snapshot(),
            status: self.status(),
            show_quick_replies: self.show_quick_replies,
        }
    }

    /// Accept a user message: validate, append to the timeline, raise the
    /// typing indicator, and open the pending exchange.
    ///
    /// Rejected with `Busy` while an exchange is outstanding — nothing is
    /// queued; the caller decides whether to disable its input meanwhile.
    pub fn submit(&mut self, text: &str) -> Result<OutboundRequest, SubmitError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        let len = trimmed.chars().count();
        if len > self.config.max_message_length {
            return Err(SubmitError::TooLong {
                len,
                max: self.config.max_message_length,
            });
        }
        if self.pending.is_some() {
            return Err(SubmitError::Busy);
        }

        let user_message_id = self.timeline.append(Author::User, Body::text(trimmed))?;
        if self.config.enable_typing_indicator {
            self.timeline.set_typing(true);
        }
        self.show_quick_replies = false;

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending = Some(PendingExchange {
            request_id,
            user_message_id,
            started_at: Utc::now(),
            generation: self.generation,
        });
        log::debug!("submit accepted, request {request_id} awaiting response");

        Ok(OutboundRequest {
            request_id,
            generation: self.generation,
            query: trimmed.to_string(),
            user_id: self.identity.user_id().to_string(),
            auth_token: self.config.auth_token.clone(),
            delay: std::time::Duration::from_millis(self.config.response_delay_ms),
        })
    }

    /// Apply a transport resolution. Returns `Ok(true)` when applied and
    /// `Ok(false)` when the resolution was stale (its generation predates
    /// a clear, or it matches no pending exchange) and was discarded.
    pub fn resolve(
        &mut self,
        request_id: u64,
        generation: u64,
        outcome: Result<AskReply, TransportError>,
    ) -> Result<bool, TimelineError> {
        if generation != self.generation {
            log::warn!("discarding stale resolution for request {request_id}");
            return Ok(false);
        }
        let matches_pending = self
            .pending
            .as_ref()
            .is_some_and(|p| p.request_id == request_id);
        if !matches_pending {
            log::warn!("discarding resolution for unknown request {request_id}");
            return Ok(false);
        }
        let pending = self.pending.take().expect("checked above");

        self.timeline.set_typing(false);
        match outcome {
            Ok(reply) => {
                self.timeline
                    .mark_status(pending.user_message_id, MessageStatus::Delivered)?;
                self.timeline.append(Author::Assistant, reply_body(reply))?;
                log::debug!("request {request_id} resolved");
            }
            Err(e) => {
                self.timeline
                    .mark_status(pending.user_message_id, MessageStatus::Failed)?;
                let text = format!("{} ({})", APOLOGY, e.status_phrase());
                self.timeline.append(Author::Assistant, Body::Text(text))?;
                log::debug!("request {request_id} failed: {e}");
            }
        }
        Ok(true)
    }

    /// Reset the conversation to a fresh greeting. Allowed in any state:
    /// an in-flight transport call is left to complete, but bumping the
    /// generation makes its eventual resolution stale, and the pending
    /// exchange is dropped so new submissions are accepted immediately.
    pub fn clear_conversation(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.timeline.clear();
        self.show_quick_replies = self.config.enable_quick_replies;
        log::debug!("conversation cleared, generation now {}", self.generation);
    }

    /// Swap the configuration. Takes effect for future submissions only;
    /// the in-flight exchange, the timeline, and the session identity are
    /// untouched.
    pub fn reconfigure(&mut self, config: ChatConfig) {
        self.timeline.set_max_user_len(config.max_message_length);
        self.timeline.set_greeting(config.greeting.clone());
        if !config.enable_quick_replies {
            self.show_quick_replies = false;
        }
        self.config = config;
    }
}

/// Interpret the assistant payload into a timeline body. Display text is
/// `summary` falling back to `response`; the tabular fragment rides along
/// when present. Leaked internal errors and empty payloads both collapse
/// to the apology.
fn reply_body(reply: AskReply) -> Body {
    let text = reply
        .summary
        .or(reply.response)
        .filter(|t| !t.trim().is_empty());
    let table = reply.table.filter(|t| !t.trim().is_empty());

    let leaked_internal_error = text
        .as_deref()
        .is_some_and(|t| t.trim().to_lowercase().starts_with(INTERNAL_ERROR_SENTINEL));
    if leaked_internal_error {
        return Body::text(APOLOGY);
    }

    match (text, table) {
        (Some(text), None) => Body::Text(text),
        (text, table @ Some(_)) => Body::Rich {
            summary: text,
            table,
        },
        (None, None) => Body::text(APOLOGY),
    }
}
