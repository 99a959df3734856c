//! User account records.

use chrono::{DateTime, Utc};

use rolegate_core::{DomainError, RoleId, UserId};

use crate::password::PasswordHash;
use crate::roles::RoleRecord;

pub const MIN_AGE: i32 = 1;
pub const MAX_AGE: i32 = 150;

/// Opaque profile photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Stored user account.
///
/// # Invariants
/// - `email` is normalized (see [`normalize_email`]) and unique; it doubles as
///   the username.
/// - `password_hash` is always a digest, never the plaintext secret.
/// - `roles` holds each role at most once, ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub password_hash: PasswordHash,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub is_active: bool,
    pub roles: Vec<RoleRecord>,
    pub photo: Option<Photo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn username(&self) -> &str {
        &self.email
    }

    /// Whether the user holds the role called `name` (canonical, no prefix).
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn role_ids(&self) -> Vec<RoleId> {
        self.roles.iter().map(|r| r.id).collect()
    }

    pub fn set_roles(&mut self, roles: Vec<RoleRecord>) {
        self.roles = dedup_roles(roles);
    }
}

/// User awaiting its store-assigned id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: PasswordHash,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub is_active: bool,
    pub roles: Vec<RoleRecord>,
}

impl NewUser {
    pub fn set_roles(&mut self, roles: Vec<RoleRecord>) {
        self.roles = dedup_roles(roles);
    }
}

fn dedup_roles(mut roles: Vec<RoleRecord>) -> Vec<RoleRecord> {
    roles.sort_by_key(|r| r.id);
    roles.dedup_by_key(|r| r.id);
    roles
}

/// Canonical form of a login identifier.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Profile fields shared by account creation and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
}

impl Profile {
    /// Validate and normalize (trimmed names, normalized email).
    pub fn validated(self) -> Result<Profile, DomainError> {
        let first_name = self.first_name.trim().to_string();
        if first_name.is_empty() {
            return Err(DomainError::validation("first name is required"));
        }

        let last_name = self.last_name.trim().to_string();
        if last_name.is_empty() {
            return Err(DomainError::validation("last name is required"));
        }

        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(DomainError::validation(format!(
                "age must be between {MIN_AGE} and {MAX_AGE}"
            )));
        }

        let email = normalize_email(&self.email);
        if email.is_empty() {
            return Err(DomainError::validation("email is required"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(DomainError::validation("invalid email format")),
        }

        Ok(Profile {
            first_name,
            last_name,
            age: self.age,
            email,
        })
    }
}
