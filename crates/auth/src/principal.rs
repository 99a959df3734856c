use std::collections::BTreeSet;

use serde::Serialize;

use rolegate_core::UserId;

use crate::authority::Authority;
use crate::password::PasswordHash;
use crate::roles::authority_of;
use crate::user::UserRecord;

/// Authenticated identity for one request or login event.
///
/// Built fresh from a [`UserRecord`] and never mutated afterwards. The
/// password digest is kept for verification only and never leaves the
/// process; [`PrincipalView`] is the outward-facing projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
    identifier: String,
    password_hash: PasswordHash,
    authorities: BTreeSet<Authority>,
    enabled: bool,
}

impl Principal {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Login identifier (the user's email).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn password_hash(&self) -> &PasswordHash {
        &self.password_hash
    }

    pub fn authorities(&self) -> &BTreeSet<Authority> {
        &self.authorities
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_authority(&self, authority: &Authority) -> bool {
        self.authorities.contains(authority)
    }

    pub fn has_any_authority(&self, wanted: &[Authority]) -> bool {
        wanted.iter().any(|a| self.authorities.contains(a))
    }

    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            user_id: self.user_id,
            identifier: self.identifier.clone(),
            authorities: self.authorities.iter().map(|a| a.as_str().to_string()).collect(),
            enabled: self.enabled,
        }
    }
}

/// Serializable projection of a [`Principal`] without the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalView {
    pub user_id: UserId,
    pub identifier: String,
    pub authorities: Vec<String>,
    pub enabled: bool,
}

/// Assemble the principal for `user`.
///
/// A user without roles is valid and gets no authorities.
pub fn build(user: &UserRecord) -> Principal {
    Principal {
        user_id: user.id,
        identifier: user.email.clone(),
        password_hash: user.password_hash.clone(),
        authorities: user.roles.iter().map(authority_of).collect(),
        enabled: user.is_active,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use rolegate_core::RoleId;

    use super::*;
    use crate::roles::RoleRecord;

    pub fn role(id: i64, name: &str) -> RoleRecord {
        let now = Utc::now();
        RoleRecord {
            id: RoleId::new(id),
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn user(email: &str, roles: &[&str], is_active: bool) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: UserId::new(1),
            email: email.to_string(),
            password_hash: PasswordHash::from_encoded("$2b$04$fixture"),
            first_name: "Test".into(),
            last_name: "User".into(),
            age: 30,
            is_active,
            roles: roles
                .iter()
                .enumerate()
                .map(|(i, name)| role(i as i64 + 1, name))
                .collect(),
            photo: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(roles: &[&str]) -> Principal {
        build(&user("someone@example.com", roles, true))
    }
}
