// ABOUTME: Library root for embedchat — an embeddable conversational-chat session core.
// ABOUTME: Timeline, turn-taking controller, session runtime, and HTTP transport.

pub mod config;
pub mod controller;
pub mod identity;
pub mod runtime;
pub mod timeline;
pub mod transport;

pub use config::ChatConfig;
pub use controller::{ChatController, ControllerStatus, SessionView, SubmitError};
pub use identity::{AuthContext, NoAuth, SessionIdentity};
pub use runtime::{ClientCommand, SessionEvent, run_session_loop};
pub use timeline::{Author, Body, Message, MessageId, MessageStatus, Timeline, TimelineError};
pub use transport::{AskReply, HttpTransport, Transport, TransportError};
