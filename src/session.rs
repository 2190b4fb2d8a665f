//! Session capability - the authenticated handle used for every platform call
//!
//! Authentication, transport and session refresh live behind these traits.
//! The client only ever sees contacts, receipts and inbound messages.

use crate::contacts::Contact;
use crate::credentials::Credentials;
use crate::error::{AuthError, FetchError, ListenError, SendError};
use async_trait::async_trait;
use std::sync::Arc;

/// Kind of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Typing,
    ReadReceipt,
    Presence,
    Other(String),
}

impl EventKind {
    /// Map the gateway's `type` field
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "message" => EventKind::Message,
            "typ" | "typing" => EventKind::Typing,
            "read_receipt" | "read" => EventKind::ReadReceipt,
            "presence" => EventKind::Presence,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// An inbound event, consumed immediately by the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub kind: EventKind,
    pub sender_id: Option<String>,
    pub thread_id: String,
    pub message_id: String,
    pub body: Option<String>,
    pub has_attachments: bool,
    pub participant_count: usize,
    pub sender_display_name: Option<String>,
}

impl InboundMessage {
    /// Plain one-to-one text message
    pub fn text(sender_id: &str, thread_id: &str, message_id: &str, body: &str) -> Self {
        Self {
            kind: EventKind::Message,
            sender_id: Some(sender_id.to_string()),
            thread_id: thread_id.to_string(),
            message_id: message_id.to_string(),
            body: Some(body.to_string()),
            has_attachments: false,
            participant_count: 1,
            sender_display_name: None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.participant_count > 1
    }
}

/// Result of a successful send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendReceipt {
    pub thread_id: Option<String>,
    pub message_id: Option<String>,
}

impl SendReceipt {
    /// Thread the send landed in; falls back to the message id
    pub fn thread(&self) -> Option<&str> {
        self.thread_id.as_deref().or(self.message_id.as_deref())
    }
}

/// Authenticated capability object
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Account the session is logged in as
    fn account(&self) -> &str;

    async fn friends_list(&self) -> Result<Vec<Contact>, FetchError>;

    /// Send `body` to a thread or user id
    async fn send_message(&self, body: &str, target: &str) -> Result<SendReceipt, SendError>;

    /// Next inbound event. `None` once the stream is closed.
    async fn next_event(&self) -> Option<Result<InboundMessage, ListenError>>;
}

/// Turns credentials into a session
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn SessionHandle>, AuthError>;
}
