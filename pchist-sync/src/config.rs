//! Credential resolution for pchist-sync
//!
//! Pocket Casts credentials come from one of three tiers, highest first:
//! 1. Command-line arguments (`--username` / `--password`)
//! 2. Environment (`POCKETCASTS_USERNAME` / `POCKETCASTS_PASSWORD`, `.env` included)
//! 3. TOML `[credentials]` section
//!
//! A tier only counts when it supplies both values. Missing credentials are
//! fatal and must be detected before any network or storage activity.

use pchist_common::config::CredentialsConfig;
use pchist_common::{Error, Result};
use tracing::{info, warn};

/// Environment variable holding the account email
pub const USERNAME_ENV: &str = "POCKETCASTS_USERNAME";

/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "POCKETCASTS_PASSWORD";

/// Pocket Casts account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn from_pair(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if is_valid_value(&u) && is_valid_value(&p) => Some(Self::new(u, p)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolve credentials from CLI, environment, then TOML
pub fn resolve_credentials(
    cli_username: Option<String>,
    cli_password: Option<String>,
    toml_credentials: &CredentialsConfig,
) -> Result<Credentials> {
    let tiers = [
        (
            "command line",
            Credentials::from_pair(cli_username, cli_password),
        ),
        (
            "environment",
            Credentials::from_pair(
                std::env::var(USERNAME_ENV).ok(),
                std::env::var(PASSWORD_ENV).ok(),
            ),
        ),
        (
            "TOML",
            Credentials::from_pair(
                toml_credentials.username.clone(),
                toml_credentials.password.clone(),
            ),
        ),
    ];

    let sources: Vec<&str> = tiers
        .iter()
        .filter(|(_, creds)| creds.is_some())
        .map(|(name, _)| *name)
        .collect();

    if sources.len() > 1 {
        warn!(
            "Pocket Casts credentials found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, creds) in tiers {
        if let Some(creds) = creds {
            info!("Pocket Casts credentials loaded from {}", source);
            return Ok(creds);
        }
    }

    Err(Error::Config(format!(
        "Pocket Casts credentials not configured. Provide them using one of:\n\
         1. Command line: --username <email> --password <password>\n\
         2. Environment: {USERNAME_ENV} and {PASSWORD_ENV} (a .env file is read)\n\
         3. TOML config: [credentials] username = \"...\", password = \"...\""
    )))
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}
