//! Command router - dispatches parsed commands and applies send results
//!
//! The router owns `RouterState` together with the notifier, so both inbound
//! messages and outbound sends advance the same state. Sends themselves are
//! performed by the caller; the router only describes them (`SendRequest`)
//! and folds the outcome back in (`complete`).

use crate::command::{Command, HELP};
use crate::config::Config;
use crate::contacts::ContactDirectory;
use crate::error::{CommandError, ListenError, SendError};
use crate::notify::{Notification, Notifier};
use crate::session::{InboundMessage, SendReceipt};
use crate::state::RouterState;
use tracing::{debug, info, warn};

/// What a send is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendKind {
    /// `message` to a resolved contact; establishes a new current thread
    Message { recipient: String },
    /// `reply` into the current thread
    Reply,
}

/// A send the caller must perform on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub kind: SendKind,
    pub target: String,
    pub body: String,
}

/// A finished send
#[derive(Debug, Clone)]
pub struct SendCompletion {
    pub request: SendRequest,
    pub result: Result<SendReceipt, SendError>,
}

/// Result of dispatching one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Print(Vec<String>),
    Send(SendRequest),
    Quit,
}

pub struct Router {
    directory: ContactDirectory,
    notifier: Notifier,
    state: RouterState,
    messages_in_flight: usize,
}

impl Router {
    pub fn new(directory: ContactDirectory, config: &Config) -> Self {
        Self {
            directory,
            notifier: Notifier::new(config),
            state: RouterState::new(),
            messages_in_flight: 0,
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    /// Anything that reads or moves the current thread waits while a
    /// `message` send may still move it. Messages go out one at a time so
    /// the last one typed is the last one applied.
    pub fn must_wait(&self, cmd: &Command) -> bool {
        self.messages_in_flight > 0
            && matches!(
                cmd,
                Command::Message { .. } | Command::Reply { .. } | Command::Unknown(_)
            )
    }

    pub fn has_pending_messages(&self) -> bool {
        self.messages_in_flight > 0
    }

    pub fn dispatch(&mut self, cmd: Command) -> Result<Dispatch, CommandError> {
        match cmd {
            Command::Message { recipient, body } => self.message(&recipient, body),
            Command::Reply { body } => self.reply(body),
            Command::Contacts => Ok(Dispatch::Print(
                self.directory
                    .iter()
                    .map(|c| c.display_name.clone())
                    .collect(),
            )),
            Command::Help => Ok(Dispatch::Print(vec![HELP.to_string()])),
            Command::Quit => Ok(Dispatch::Quit),
            Command::Unknown(raw) => {
                if self.state.has_thread() {
                    self.reply(raw)
                } else {
                    Err(CommandError::InvalidCommand)
                }
            }
        }
    }

    fn message(&mut self, query: &str, body: String) -> Result<Dispatch, CommandError> {
        let contact = self
            .directory
            .find_by_query(query)
            .ok_or_else(|| CommandError::RecipientNotFound(query.to_string()))?;

        debug!(query, recipient = %contact.display_name, "Resolved recipient");
        self.messages_in_flight += 1;

        Ok(Dispatch::Send(SendRequest {
            kind: SendKind::Message {
                recipient: contact.display_name.clone(),
            },
            target: contact.id.clone(),
            body,
        }))
    }

    fn reply(&mut self, body: String) -> Result<Dispatch, CommandError> {
        let thread = self
            .state
            .last_thread_id
            .clone()
            .ok_or(CommandError::NoThread)?;

        Ok(Dispatch::Send(SendRequest {
            kind: SendKind::Reply,
            target: thread,
            body,
        }))
    }

    /// Apply a finished send. Failures leave the state untouched.
    pub fn complete(&mut self, completion: SendCompletion) -> Result<Vec<String>, CommandError> {
        let SendCompletion { request, result } = completion;

        if let SendKind::Message { .. } = request.kind {
            self.messages_in_flight = self.messages_in_flight.saturating_sub(1);
        }

        let receipt = result.map_err(|e| {
            warn!(to = %request.target, "Send failed: {}", e);
            CommandError::from(e)
        })?;

        match request.kind {
            SendKind::Message { recipient } => {
                match receipt.thread() {
                    Some(thread) => self.state.set_thread(thread),
                    None => warn!("Send to {} returned no thread id", recipient),
                }
                let banner = self.state.recipient_changed(&recipient);
                let lines = self
                    .notifier
                    .outbound(banner.then_some(recipient.as_str()), &request.body);
                self.state.set_recipient(&recipient);
                info!(thread = ?self.state.last_thread_id, "Message sent to {}", recipient);
                Ok(lines)
            }
            SendKind::Reply => {
                info!(thread = %request.target, "Reply sent");
                Ok(self.notifier.outbound(None, &request.body))
            }
        }
    }

    /// Render an inbound event. Listen errors become a printed line.
    pub fn handle_inbound(
        &mut self,
        event: Result<InboundMessage, ListenError>,
    ) -> Option<InboundOutcome> {
        match event {
            Ok(msg) => self
                .notifier
                .render(&msg, &self.directory, &mut self.state)
                .map(InboundOutcome::Notify),
            Err(e) => {
                warn!("Listen error: {}", e);
                Some(InboundOutcome::Error(e.to_string()))
            }
        }
    }
}

/// What the loop should show for an inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    Notify(Notification),
    Error(String),
}
