//! Conversational state shared by the router and the notifier

/// Most recent thread and the last recipient shown on screen.
///
/// Both fields start unset and only move forward to newer values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterState {
    pub last_thread_id: Option<String>,
    pub last_displayed_recipient: Option<String>,
}

impl RouterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_thread(&self) -> bool {
        self.last_thread_id.is_some()
    }

    pub fn is_current_thread(&self, thread_id: &str) -> bool {
        self.last_thread_id.as_deref() == Some(thread_id)
    }

    /// True when `recipient` is not the one shown last, so a banner is due
    pub fn recipient_changed(&self, recipient: &str) -> bool {
        self.last_displayed_recipient.as_deref() != Some(recipient)
    }

    pub fn set_thread(&mut self, thread_id: &str) {
        self.last_thread_id = Some(thread_id.to_string());
    }

    pub fn set_recipient(&mut self, recipient: &str) {
        self.last_displayed_recipient = Some(recipient.to_string());
    }
}
