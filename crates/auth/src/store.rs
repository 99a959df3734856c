//! Credential store port.
//!
//! The core only needs lookups by email/id, saves, and role lookups by
//! name/ids. Implementations live in `rolegate-infra`.

use async_trait::async_trait;
use thiserror::Error;

use rolegate_core::{RoleId, UserId};

use crate::roles::{NewRole, RoleRecord};
use crate::user::{NewUser, UserRecord};

/// Column whose uniqueness a write violated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    RoleName,
}

impl core::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::RoleName => f.write_str("role name"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {field}: {value}")]
    UniqueViolation { field: UniqueField, value: String },

    /// Update of a record that does not exist.
    #[error("record not found")]
    NotFound,

    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Persistence operations the authentication core consumes.
///
/// Implementations must enforce email and role-name uniqueness and keep each
/// single-record read/write atomic.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact lookup on the normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Persist every field and the full role set of an existing user.
    async fn save_user(&self, user: UserRecord) -> Result<UserRecord, StoreError>;

    /// Returns `false` when no such user existed.
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StoreError>;

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError>;

    /// Roles matching `ids`; missing ids are simply absent from the result.
    async fn find_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<RoleRecord>, StoreError>;

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError>;

    async fn create_role(&self, role: NewRole) -> Result<RoleRecord, StoreError>;

    async fn save_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError>;

    /// Remove the role and every user's membership in it. Returns `false`
    /// when no such role existed.
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError>;
}
