//! Configuration and constants

use crate::error::{Error, Result};
use std::time::Duration;

/// Base of the link shown for messages without renderable text
pub const PERMALINK_BASE: &str = "https://www.messenger.com/m/";

/// Label used when a contact has no display name
pub const UNKNOWN_USER: &str = "Unknown User";

/// Runtime settings for the client
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: String,
    pub poll_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub error_pause_ms: u64,
    pub permalink_base: String,
    /// Program used for audible alerts; `None` falls back to the terminal bell
    pub speak_command: Option<String>,
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8765".to_string(),
            poll_timeout_secs: 30,
            connect_timeout_secs: 15,
            error_pause_ms: 1000,
            permalink_base: PERMALINK_BASE.to_string(),
            speak_command: if cfg!(target_os = "macos") {
                Some("say".to_string())
            } else {
                None
            },
            prompt: "> ".to_string(),
        }
    }
}

impl Config {
    /// Defaults with `MESSENGER_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MESSENGER_GATEWAY_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                return Err(Error::Config("MESSENGER_GATEWAY_URL is empty".to_string()));
            }
            self.gateway_url = url;
        }

        if let Some(cmd) = lookup("MESSENGER_SPEAK_COMMAND") {
            let cmd = cmd.trim();
            self.speak_command = if cmd.is_empty() {
                None
            } else {
                Some(cmd.to_string())
            };
        }

        if let Some(secs) = lookup("MESSENGER_POLL_TIMEOUT_SECS") {
            self.poll_timeout_secs = secs.trim().parse().map_err(|e| {
                Error::Config(format!("MESSENGER_POLL_TIMEOUT_SECS={}: {}", secs, e))
            })?;
        }

        Ok(self)
    }

    /// Create config for testing: no speech, short pauses
    pub fn for_test(gateway_url: &str) -> Self {
        Self {
            gateway_url: gateway_url.to_string(),
            poll_timeout_secs: 1,
            connect_timeout_secs: 2,
            error_pause_ms: 10,
            permalink_base: PERMALINK_BASE.to_string(),
            speak_command: None,
            prompt: "> ".to_string(),
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Bound on establishing a connection to the gateway
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.gateway_url.starts_with("http://"));
        assert_eq!(config.permalink_base, PERMALINK_BASE);
        assert_eq!(config.prompt, "> ");
    }

    #[test]
    fn test_test_config() {
        let config = Config::for_test("http://localhost:1");
        assert_eq!(config.gateway_url, "http://localhost:1");
        assert!(config.speak_command.is_none());
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_overrides_apply() {
        let config = Config::default()
            .with_overrides(lookup(&[
                ("MESSENGER_GATEWAY_URL", "http://bridge:9000/"),
                ("MESSENGER_SPEAK_COMMAND", "espeak"),
                ("MESSENGER_POLL_TIMEOUT_SECS", "5"),
            ]))
            .unwrap();
        assert_eq!(config.gateway_url, "http://bridge:9000");
        assert_eq!(config.speak_command.as_deref(), Some("espeak"));
        assert_eq!(config.poll_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_empty_speak_command_disables_speech() {
        let config = Config::default()
            .with_overrides(lookup(&[("MESSENGER_SPEAK_COMMAND", "")]))
            .unwrap();
        assert!(config.speak_command.is_none());
    }

    #[test]
    fn test_bad_poll_timeout_is_config_error() {
        let result =
            Config::default().with_overrides(lookup(&[("MESSENGER_POLL_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_permalink_base() {
        assert!(PERMALINK_BASE.ends_with("/m/"));
    }
}
