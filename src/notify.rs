//! Notification formatting for inbound and outbound messages
//!
//! Renders console lines, picks the alert tier and keeps `RouterState`
//! pointed at the latest thread and sender.

use crate::config::{Config, UNKNOWN_USER};
use crate::contacts::ContactDirectory;
use crate::session::{EventKind, InboundMessage};
use crate::state::RouterState;
use std::io::Write;
use std::process::Stdio;
use tracing::{debug, warn};

const BLINK: &str = "\x1b[5m";
const CYAN_BG: &str = "\x1b[46m";
const GREEN_BG: &str = "\x1b[42m";
const RESET: &str = "\x1b[0m";
const BELL: &str = "\x07";

/// Alert tier for an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Same thread as last time: terminal bell only
    Bell,
    /// New thread: announce the sender
    Announce(String),
}

/// A rendered inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub label: String,
    pub alert: Alert,
    pub lines: Vec<String>,
}

/// Formats messages for the console
#[derive(Debug, Clone)]
pub struct Notifier {
    permalink_base: String,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        Self {
            permalink_base: config.permalink_base.clone(),
        }
    }

    /// Render an inbound event and advance the state.
    ///
    /// Returns `None` without touching the state for non-message events,
    /// events without a sender and senders missing from the directory.
    pub fn render(
        &self,
        msg: &InboundMessage,
        directory: &ContactDirectory,
        state: &mut RouterState,
    ) -> Option<Notification> {
        if msg.kind != EventKind::Message {
            return None;
        }
        let sender_id = msg.sender_id.as_deref()?;

        // Stale snapshot or stranger: dropped, same as the listener always did
        let Some(contact) = directory.find_by_id(sender_id) else {
            debug!(sender = sender_id, thread = %msg.thread_id, "Dropping message from unknown sender");
            return None;
        };

        let name = if contact.display_name.is_empty() {
            UNKNOWN_USER
        } else {
            contact.display_name.as_str()
        };
        let label = sender_label(
            name,
            msg.participant_count,
            msg.sender_display_name.as_deref().unwrap_or(sender_id),
        );

        let alert = if state.is_current_thread(&msg.thread_id) {
            Alert::Bell
        } else {
            Alert::Announce(label.clone())
        };

        let mut body = match msg.body.as_deref() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => self.permalink(&msg.message_id),
        };
        if msg.has_attachments {
            body.push_str(" [attachment]");
        }

        let mut lines = Vec::new();
        if state.recipient_changed(&label) {
            lines.extend(banner(&label));
        }
        lines.push(String::new());
        lines.push(format!("{} {} {}: {}", CYAN_BG, label, RESET, body));

        state.set_thread(&msg.thread_id);
        state.set_recipient(&label);

        Some(Notification {
            label,
            alert,
            lines,
        })
    }

    /// Confirmation for a message we sent. `banner_for` is set when the
    /// recipient differs from the one on screen.
    pub fn outbound(&self, banner_for: Option<&str>, body: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(recipient) = banner_for {
            lines.extend(banner(recipient));
        }
        lines.push(format!("{} You {}: {}", GREEN_BG, RESET, body));
        lines
    }

    pub fn permalink(&self, message_id: &str) -> String {
        format!("{}{}", self.permalink_base, message_id)
    }
}

/// Sender label; group chats quote the contact and name the actual sender
pub fn sender_label(name: &str, participant_count: usize, sender_display_name: &str) -> String {
    if participant_count > 1 {
        format!("'{}' ({})", name, sender_display_name)
    } else {
        name.to_string()
    }
}

fn banner(recipient: &str) -> [String; 2] {
    [
        String::new(),
        format!(
            "{} ---------- {} {} {} ---------- {}",
            BLINK, RESET, recipient, BLINK, RESET
        ),
    ]
}

/// Carries out alerts: bell on stderr, or a spoken announcement
#[derive(Debug, Clone)]
pub struct Alerter {
    speak_command: Option<String>,
}

impl Alerter {
    pub fn new(config: &Config) -> Self {
        Self {
            speak_command: config.speak_command.clone(),
        }
    }

    /// Must be called from within a tokio runtime
    pub fn fire(&self, alert: &Alert) {
        match alert {
            Alert::Bell => ring_bell(),
            Alert::Announce(label) => {
                if !self.announce(label) {
                    ring_bell();
                }
            }
        }
    }

    /// Start the speech command for `label`. Returns false when there is no
    /// command or it could not be started.
    pub fn announce(&self, label: &str) -> bool {
        let Some(cmd) = &self.speak_command else {
            return false;
        };
        let spawned = tokio::process::Command::new(cmd)
            .arg(format!("new message from {}", label))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to run speech command {}: {}", cmd, e);
                false
            }
        }
    }
}

fn ring_bell() {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(BELL.as_bytes());
    let _ = stderr.flush();
}
