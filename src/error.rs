//! Error types for messenger-cli

use std::path::PathBuf;
use thiserror::Error;

/// Startup failures while obtaining an authenticated session
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not read credentials file {path}: {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials: {0}")]
    MalformedCredentials(#[from] serde_json::Error),

    #[error("credential prompt failed: {0}")]
    Prompt(String),

    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("login transport error: {0}")]
    Transport(String),
}

/// Contact directory load failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("friends list transport error: {0}")]
    Transport(String),

    #[error("friends list request failed with status {0}")]
    Status(u16),

    #[error("friends list decode error: {0}")]
    Decode(String),
}

/// Outbound send failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    #[error("send transport error: {0}")]
    Transport(String),

    #[error("send failed with status {0}")]
    Status(u16),

    #[error("send response decode error: {0}")]
    Decode(String),
}

/// Inbound stream failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListenError {
    #[error("listen transport error: {0}")]
    Transport(String),

    #[error("listen request failed with status {0}")]
    Status(u16),

    #[error("listen decode error: {0}")]
    Decode(String),
}

/// A line that names a command but does not carry what the command needs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid message - check your syntax")]
    MissingRecipient,

    #[error("empty message body")]
    EmptyBody,
}

/// Steady-state command failures. Always reported, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("User \"{0}\" could not be found in your friends list!")]
    RecipientNotFound(String),

    #[error("Error - can't reply to messages you haven't yet received! You need to receive a message before using `reply`!")]
    NoThread,

    #[error("Invalid command - check your syntax")]
    InvalidCommand,

    #[error("ERROR! {0}")]
    Send(#[from] SendError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
