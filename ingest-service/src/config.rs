//! Configuration module for environment variable parsing.
//!
//! All configuration is read once at startup and carried in an immutable
//! `Config` value passed into the application state. Nothing here is
//! re-read after boot.

use std::collections::HashSet;
use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of pooled database connections
    pub database_max_connections: u32,

    /// Static set of accepted `X-API-Key` values
    pub api_keys: HashSet<String>,

    /// Slack signing secret for inbound webhook verification
    pub slack_signing_secret: Option<String>,

    /// Slack bot token (kept for deployment parity; not used by handlers)
    pub slack_bot_token: Option<String>,

    /// Optional Slack incoming-webhook URL for status lines
    pub slack_log_webhook_url: Option<String>,

    /// Maximum age in seconds for Slack request timestamps
    pub slack_signature_max_age: u64,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `DATABASE_URL` is required; everything else has a default or is
    /// optional.
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            api_keys: parse_key_set("INGEST_API_KEYS"),

            slack_signing_secret: env::var("SLACK_SIGNING_SECRET").ok(),

            slack_bot_token: env::var("SLACK_BOT_TOKEN").ok(),

            slack_log_webhook_url: env::var("SLACK_LOG_WEBHOOK_URL").ok(),

            slack_signature_max_age: env::var("SLACK_SIGNATURE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes default

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8400),
        })
    }
}

/// Parse a comma-separated list of keys into a set.
///
/// Entries are trimmed and empty entries are dropped, so trailing commas
/// and spacing in the variable are harmless.
fn parse_key_set(name: &str) -> HashSet<String> {
    env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_set_trims_and_drops_empties() {
        env::set_var("TEST_KEY_SET", " alpha, beta ,, gamma,");
        let keys = parse_key_set("TEST_KEY_SET");
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("alpha"));
        assert!(keys.contains("beta"));
        assert!(keys.contains("gamma"));
        env::remove_var("TEST_KEY_SET");
    }

    #[test]
    fn test_parse_key_set_missing_var() {
        let keys = parse_key_set("TEST_KEY_SET_NONEXISTENT");
        assert!(keys.is_empty());
    }

    #[test]
    fn test_from_env_requires_database_url() {
        // Single test owns this variable; the set/unset sequence would
        // race if split across tests.
        env::remove_var("DATABASE_URL");
        assert!(Config::from_env().is_err());

        env::set_var("DATABASE_URL", "postgres://db:5432/ingest");
        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "postgres://db:5432/ingest");
        env::remove_var("DATABASE_URL");
    }
}
