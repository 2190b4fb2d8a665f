//! REPL command parsing

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Leading `"recipient"` followed by the message body
static QUOTED_RECIPIENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)^"([^"]*)"(.*)$"#).expect("Invalid recipient regex"));

pub const HELP: &str = "Commands:\n\
    \tmessage \"[user]\" [message]   (alias: m)\n\
    \treply [message]              (alias: r)\n\
    \tcontacts\n\
    \thelp\n\
    \tquit\n\
    Any other text is sent as a reply to the most recent thread.";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message { recipient: String, body: String },
    Reply { body: String },
    Contacts,
    Help,
    Quit,
    /// Unrecognised first token; the router decides between implicit reply and error
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (token, rest) = split_command(line);

        match canonical(token) {
            Some("message") => parse_message(rest),
            Some("reply") => parse_reply(rest),
            Some("contacts") => Ok(Command::Contacts),
            Some("help") => Ok(Command::Help),
            Some("quit") => Ok(Command::Quit),
            _ => Ok(Command::Unknown(line.trim().to_string())),
        }
    }
}

/// Map short aliases to command names
fn canonical(token: &str) -> Option<&'static str> {
    match token {
        "message" | "m" => Some("message"),
        "reply" | "r" => Some("reply"),
        "contacts" => Some("contacts"),
        "help" => Some("help"),
        "quit" | "exit" => Some("quit"),
        _ => None,
    }
}

/// First whitespace-delimited token and the rest of the line
fn split_command(line: &str) -> (&str, &str) {
    let trimmed = line.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    }
}

fn parse_message(rest: &str) -> Result<Command, ParseError> {
    let rest = rest.trim();

    let (recipient, body) = match QUOTED_RECIPIENT.captures(rest) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()).unwrap_or(""),
            caps.get(2).map(|m| m.as_str()).unwrap_or(""),
        ),
        // No quotes: the first token is the recipient
        None => split_command(rest),
    };

    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(ParseError::MissingRecipient);
    }

    let body = body.trim();
    if body.is_empty() {
        return Err(ParseError::EmptyBody);
    }

    Ok(Command::Message {
        recipient: recipient.to_string(),
        body: body.to_string(),
    })
}

fn parse_reply(rest: &str) -> Result<Command, ParseError> {
    let body = rest.trim();
    if body.is_empty() {
        return Err(ParseError::EmptyBody);
    }
    Ok(Command::Reply {
        body: body.to_string(),
    })
}
