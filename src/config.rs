//! Runtime configuration parsed from environment variables.
//!
//! Required:
//! - `DATABASE_URL`
//!
//! Optional:
//! - `PORT`: default 3001
//! - `DB_MAX_CONNECTIONS`: default 5
//! - `DB_TIMEOUT_MS`: bound on each storage call, default 5000
//! - `JWT_SECRET`: token signing secret; a random per-process secret is
//!   generated when absent (tokens then die with the process)
//! - `TOKEN_TTL_HOURS`: default 168 (7 days)
//! - `CORS_ORIGIN`: single allowed origin; any origin when absent
//! - `WS_CHANNEL_CAPACITY`: per-connection outbound queue depth, default 256

use std::fmt::Write;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DB_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24 * 7;
pub const DEFAULT_WS_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    pub jwt_secret: String,
    /// `true` when `jwt_secret` was generated rather than configured.
    pub jwt_secret_generated: bool,
    pub token_ttl: Duration,
    pub cors_origin: Option<String>,
    pub ws_channel_capacity: usize,
}

impl Config {
    /// Build typed config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is unset or any numeric variable
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = non_empty(lookup("DATABASE_URL")).ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let (jwt_secret, jwt_secret_generated) = match non_empty(lookup("JWT_SECRET")) {
            Some(secret) => (secret, false),
            None => (generate_secret(), true),
        };

        let ws_channel_capacity = parse_or(&lookup, "WS_CHANNEL_CAPACITY", DEFAULT_WS_CHANNEL_CAPACITY)?;
        if ws_channel_capacity == 0 {
            return Err(ConfigError::Invalid { var: "WS_CHANNEL_CAPACITY", value: "0".into() });
        }

        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            db_timeout: Duration::from_millis(parse_or(&lookup, "DB_TIMEOUT_MS", DEFAULT_DB_TIMEOUT_MS)?),
            jwt_secret,
            jwt_secret_generated,
            token_ttl: Duration::from_secs(parse_or(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?.saturating_mul(3600)),
            cors_origin: non_empty(lookup("CORS_ORIGIN")),
            ws_channel_capacity,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_timeout", &self.db_timeout)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_secret_generated", &self.jwt_secret_generated)
            .field("token_ttl", &self.token_ttl)
            .field("cors_origin", &self.cors_origin)
            .field("ws_channel_capacity", &self.ws_channel_capacity)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(lookup(var)) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

/// Random 32-byte hex secret.
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
