//! Server-side session registry.
//!
//! Sessions live in process memory, keyed by an unguessable id carried in the
//! session cookie. A restart logs everyone out.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

use rolegate_auth::{validate_session, SessionClaims, SessionError, SessionId};
use rolegate_core::UserId;

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionClaims>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for a freshly authenticated user.
    pub fn create(&self, user_id: UserId, identifier: &str, now: DateTime<Utc>) -> SessionClaims {
        let claims = SessionClaims::issue(user_id, identifier, now, self.ttl);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(claims.session_id, claims.clone());
        claims
    }

    /// Claims for `id` if the session exists and is still within its window.
    ///
    /// Expired sessions are dropped on sight.
    pub fn lookup(&self, id: &SessionId, now: DateTime<Utc>) -> Option<SessionClaims> {
        let claims = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()?;

        match validate_session(&claims, now) {
            Ok(()) => Some(claims),
            Err(SessionError::Expired) => {
                self.revoke(id);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding session with invalid time window");
                self.revoke(id);
                None
            }
        }
    }

    pub fn revoke(&self, id: &SessionId) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Drop every session of `user_id`; returns how many were open.
    pub fn revoke_user(&self, user_id: UserId) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, claims| claims.user_id != user_id);
        before - sessions.len()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, claims| validate_session(claims, now).is_ok());
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
