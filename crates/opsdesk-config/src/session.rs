use std::env;

use crate::env_parse;

pub const DEFAULT_COOKIE_NAME: &str = "opsdesk_session";

/// Settings for the browser session cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Marks the cookie `Secure`; turn off only for plain-HTTP local development.
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: true,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            cookie_name: env::var("SESSION_COOKIE_NAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            cookie_secure: env_parse("SESSION_COOKIE_SECURE", true),
        }
    }
}
