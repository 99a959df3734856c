//! Configuration loading and representation.
//!
//! Everything comes from environment variables; unset variables fall back to
//! development defaults.

use std::net::SocketAddr;

use thiserror::Error;

use rolegate_auth::password::{DEFAULT_COST, MAX_COST, MIN_COST};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 30;
/// One year.
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;
/// Costs below this are accepted but only suitable for tests.
pub const RECOMMENDED_MIN_COST: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `ROLEGATE_BIND`
    pub bind: SocketAddr,
    /// `DATABASE_URL`; in-memory store when absent.
    pub database_url: Option<String>,
    /// `BCRYPT_COST`
    pub bcrypt_cost: u32,
    /// `ROLEGATE_SESSION_TTL_MINUTES`
    pub session_ttl_minutes: i64,
    /// `ROLEGATE_SEED_DEMO`: create the demo admin/user accounts at startup.
    pub seed_demo_accounts: bool,
    /// `ROLEGATE_SECURE_COOKIES`: mark session cookies `Secure`.
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = match get("ROLEGATE_BIND") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("ROLEGATE_BIND", format!("{e}")))?,
            None => DEFAULT_BIND
                .parse()
                .map_err(|e| ConfigError::invalid("ROLEGATE_BIND", format!("{e}")))?,
        };

        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(raw) => {
                let cost: u32 = raw
                    .parse()
                    .map_err(|e| ConfigError::invalid("BCRYPT_COST", format!("{e}")))?;
                if !(MIN_COST..=MAX_COST).contains(&cost) {
                    return Err(ConfigError::invalid(
                        "BCRYPT_COST",
                        format!("must be between {MIN_COST} and {MAX_COST}"),
                    ));
                }
                if cost < RECOMMENDED_MIN_COST {
                    tracing::warn!(
                        cost,
                        recommended = RECOMMENDED_MIN_COST,
                        "BCRYPT_COST is below the production work factor"
                    );
                }
                cost
            }
            None => DEFAULT_COST,
        };

        let session_ttl_minutes = match get("ROLEGATE_SESSION_TTL_MINUTES") {
            Some(raw) => {
                let minutes: i64 = raw.parse().map_err(|e| {
                    ConfigError::invalid("ROLEGATE_SESSION_TTL_MINUTES", format!("{e}"))
                })?;
                if minutes <= 0 {
                    return Err(ConfigError::invalid(
                        "ROLEGATE_SESSION_TTL_MINUTES",
                        "must be positive",
                    ));
                }
                if minutes > MAX_SESSION_TTL_MINUTES {
                    return Err(ConfigError::invalid(
                        "ROLEGATE_SESSION_TTL_MINUTES",
                        format!("must be at most {MAX_SESSION_TTL_MINUTES}"),
                    ));
                }
                minutes
            }
            None => DEFAULT_SESSION_TTL_MINUTES,
        };

        Ok(Self {
            bind,
            database_url: get("DATABASE_URL"),
            bcrypt_cost,
            session_ttl_minutes,
            seed_demo_accounts: flag(get("ROLEGATE_SEED_DEMO"), "ROLEGATE_SEED_DEMO", true)?,
            secure_cookies: flag(get("ROLEGATE_SECURE_COOKIES"), "ROLEGATE_SECURE_COOKIES", false)?,
        })
    }
}

fn flag(raw: Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::invalid(var, format!("expected a boolean, got {other:?}"))),
    }
}
