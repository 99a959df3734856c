use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use rolegate_core::{DomainError, UserId};

/// Opaque session handle carried in the session cookie.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random id. Unguessable, so v4 rather than time-ordered v7.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("SessionId: {e}")))
    }
}

/// What a server-side session remembers about its holder.
///
/// Authorities are deliberately absent: the principal is rebuilt from the
/// store on every request so role changes and disabling apply immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub identifier: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn issue(user_id: UserId, identifier: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            session_id: SessionId::generate(),
            user_id,
            identifier: identifier.into(),
            issued_at: now,
            // Saturates instead of overflowing on absurd TTLs.
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Check the session's time window against `now`.
pub fn validate_session(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), SessionError> {
    if claims.expires_at <= claims.issued_at {
        return Err(SessionError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(SessionError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(SessionError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims::issue(UserId::new(7), "alice@example.com", now, Duration::minutes(30))
    }

    #[test]
    fn fresh_session_is_valid() {
        let now = Utc::now();
        assert_eq!(validate_session(&claims(now), now), Ok(()));
        assert_eq!(validate_session(&claims(now), now + Duration::minutes(29)), Ok(()));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let c = claims(now);
        assert_eq!(validate_session(&c, c.expires_at), Err(SessionError::Expired));
    }

    #[test]
    fn future_and_inverted_windows_are_rejected() {
        let now = Utc::now();
        let c = claims(now);
        assert_eq!(
            validate_session(&c, now - Duration::seconds(1)),
            Err(SessionError::NotYetValid)
        );

        let inverted = SessionClaims {
            expires_at: c.issued_at,
            ..c
        };
        assert_eq!(validate_session(&inverted, now), Err(SessionError::InvalidTimeWindow));
    }

    #[test]
    fn oversized_ttl_saturates() {
        let now = Utc::now();
        let c = SessionClaims::issue(UserId::new(7), "alice@example.com", now, Duration::MAX);
        assert_eq!(c.expires_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(validate_session(&c, now), Ok(()));
    }

    #[test]
    fn session_ids_are_unique_and_parse_back() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<SessionId>().unwrap(), a);
        assert!("not-a-session".parse::<SessionId>().is_err());
    }
}
