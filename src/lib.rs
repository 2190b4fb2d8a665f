//! messenger-cli - terminal chat client
//!
//! Streams inbound messages from an authenticated session, renders them with
//! an alert, and sends messages and replies from a small REPL.

pub mod command;
pub mod config;
pub mod contacts;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod repl;
pub mod router;
pub mod session;
pub mod state;

pub use error::{Error, Result};
