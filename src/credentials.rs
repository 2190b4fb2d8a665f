//! Credential bootstrap - JSON file or interactive prompt

use crate::error::AuthError;
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Login credentials forwarded to the session gateway.
///
/// Fields other than `email` and `password` (saved session state, options)
/// are kept in `extra` and sent along untouched.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            extra: Map::new(),
        }
    }

    /// Parse credentials from JSON text
    pub fn from_json(text: &str) -> Result<Self, AuthError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read credentials from a JSON file
    pub fn load_file(path: &Path) -> Result<Self, AuthError> {
        let text = fs::read_to_string(path).map_err(|source| AuthError::CredentialFile {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            extra_fields = credentials.extra.len(),
            "Loaded credentials file"
        );
        Ok(credentials)
    }

    /// Ask for email and a hidden password on the terminal
    pub fn prompt() -> Result<Self, AuthError> {
        println!(
            "Enter your credentials - your password will not be visible as you type it in"
        );

        let email: String = Input::new()
            .with_prompt("email")
            .interact_text()
            .map_err(|e| AuthError::Prompt(e.to_string()))?;

        let password = Password::new()
            .with_prompt("password")
            .allow_empty_password(true)
            .interact()
            .map_err(|e| AuthError::Prompt(e.to_string()))?;

        Ok(Self::new(email.trim(), password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}
