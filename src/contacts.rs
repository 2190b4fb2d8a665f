//! Contact directory - snapshot of the friends list loaded at startup

use crate::error::FetchError;
use crate::session::SessionHandle;
use tracing::info;

/// Contact information
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    pub display_name: String,
    pub alias: Option<String>,
}

impl Contact {
    pub fn new(id: &str, display_name: &str, alias: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            alias: alias.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// Recipient match: display name prefix or exact alias, ignoring case
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.display_name.to_lowercase().starts_with(&query)
            || self
                .alias
                .as_deref()
                .map(|a| a.to_lowercase() == query)
                .unwrap_or(false)
    }
}

/// Read-only contact list, kept in load order
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    contacts: Vec<Contact>,
}

impl ContactDirectory {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }

    /// Fetch the friends list once
    pub async fn load(session: &dyn SessionHandle) -> Result<Self, FetchError> {
        let contacts = session.friends_list().await?;
        info!("Loaded {} contacts", contacts.len());
        Ok(Self::new(contacts))
    }

    /// First contact in load order matching `query`
    pub fn find_by_query(&self, query: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.matches(query))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
