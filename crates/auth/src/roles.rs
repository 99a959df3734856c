use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{DomainError, RoleId};

use crate::authority::{Authority, ROLE_PREFIX};
use crate::error::AuthError;
use crate::store::{CredentialStore, StoreError};

/// Stored role.
///
/// `name` is canonical (no `ROLE_` prefix) and unique. Users own the
/// user-role relationship; a role does not know its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role awaiting its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

/// Authority granted by holding `role`.
pub fn authority_of(role: &RoleRecord) -> Authority {
    Authority::for_role_name(&role.name)
}

/// Normalize a role name for storage: trimmed, without the `ROLE_` prefix.
pub fn canonical_role_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    let bare = trimmed.strip_prefix(ROLE_PREFIX).unwrap_or(trimmed);
    if bare.is_empty() {
        return Err(DomainError::validation("role name cannot be empty"));
    }
    if bare.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("role name cannot contain whitespace"));
    }
    Ok(bare.to_string())
}

/// Maps role names and ids to stored role records.
#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn CredentialStore>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Exact, case-sensitive lookup.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<RoleRecord>, AuthError> {
        Ok(self.store.find_role_by_name(name).await?)
    }

    pub async fn find_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, AuthError> {
        Ok(self.store.find_role_by_id(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<RoleRecord>, AuthError> {
        Ok(self.store.list_roles().await?)
    }

    /// Resolve every id or fail with the first missing one.
    ///
    /// Duplicate ids collapse; the result is ordered by id.
    pub async fn resolve_all(&self, ids: &[RoleId]) -> Result<Vec<RoleRecord>, AuthError> {
        let wanted: BTreeSet<RoleId> = ids.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let lookup: Vec<RoleId> = wanted.iter().copied().collect();
        let mut found = self.store.find_roles_by_ids(&lookup).await?;
        found.sort_by_key(|r| r.id);
        found.dedup_by_key(|r| r.id);

        let found_ids: BTreeSet<RoleId> = found.iter().map(|r| r.id).collect();
        if let Some(missing) = wanted.iter().find(|id| !found_ids.contains(id)) {
            return Err(AuthError::RoleNotFound(*missing));
        }

        Ok(found)
    }

    /// Return the role called `name`, creating it if absent.
    ///
    /// Startup seeding only; must not race request traffic.
    pub async fn ensure_exists(&self, name: &str) -> Result<RoleRecord, AuthError> {
        let name = canonical_role_name(name)?;
        if let Some(existing) = self.store.find_role_by_name(&name).await? {
            return Ok(existing);
        }
        let role = self.insert(name, None).await?;
        tracing::info!(role = %role.name, role_id = %role.id, "created missing role");
        Ok(role)
    }

    /// Create a role; an existing name is a conflict, never a merge.
    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<RoleRecord, AuthError> {
        let name = canonical_role_name(name)?;
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.insert(name, description).await
    }

    /// Rename or re-describe an existing role.
    pub async fn update(
        &self,
        id: RoleId,
        name: &str,
        description: Option<String>,
    ) -> Result<RoleRecord, AuthError> {
        let name = canonical_role_name(name)?;
        let mut role = self
            .store
            .find_role_by_id(id)
            .await?
            .ok_or(AuthError::RoleNotFound(id))?;
        role.name = name.clone();
        role.description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        match self.store.save_role(role).await {
            Ok(role) => Ok(role),
            Err(StoreError::UniqueViolation { .. }) => Err(AuthError::RoleNameConflict(name)),
            Err(StoreError::NotFound) => Err(AuthError::RoleNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a role; holders lose it (and its authority) immediately.
    pub async fn delete(&self, id: RoleId) -> Result<(), AuthError> {
        if !self.store.delete_role(id).await? {
            return Err(AuthError::RoleNotFound(id));
        }
        tracing::info!(role_id = %id, "role deleted");
        Ok(())
    }

    async fn insert(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<RoleRecord, AuthError> {
        match self
            .store
            .create_role(NewRole {
                name: name.clone(),
                description,
            })
            .await
        {
            Ok(role) => Ok(role),
            Err(StoreError::UniqueViolation { .. }) => Err(AuthError::RoleNameConflict(name)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_drop_prefix_and_whitespace() {
        assert_eq!(canonical_role_name(" ADMIN ").unwrap(), "ADMIN");
        assert_eq!(canonical_role_name("ROLE_USER").unwrap(), "USER");
        assert!(canonical_role_name("ROLE_").is_err());
        assert!(canonical_role_name("SUPER USER").is_err());
    }

    #[test]
    fn authority_is_never_double_prefixed() {
        let now = Utc::now();
        let role = RoleRecord {
            id: RoleId::new(1),
            name: "ROLE_ADMIN".into(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(authority_of(&role).as_str(), "ROLE_ADMIN");

        let role = RoleRecord {
            name: "USER".into(),
            ..role
        };
        assert_eq!(authority_of(&role).as_str(), "ROLE_USER");
    }

    #[tokio::test]
    async fn resolve_all_fails_entirely_on_a_missing_id() {
        let resolver = RoleResolver::new(crate::testing::seeded_store().await);
        let err = resolver
            .resolve_all(&[RoleId::new(1), RoleId::new(2), RoleId::new(999)])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RoleNotFound(id) if id == RoleId::new(999)));

        let roles = resolver
            .resolve_all(&[RoleId::new(2), RoleId::new(1), RoleId::new(2)])
            .await
            .unwrap();
        assert_eq!(roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), ["ADMIN", "USER"]);
        assert!(resolver.resolve_all(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_exists_is_idempotent_and_create_conflicts() {
        let resolver = RoleResolver::new(crate::testing::seeded_store().await);
        let first = resolver.ensure_exists("AUDITOR").await.unwrap();
        let again = resolver.ensure_exists("ROLE_AUDITOR").await.unwrap();
        assert_eq!(first.id, again.id);

        let err = resolver.create("ADMIN", None).await.unwrap_err();
        assert!(matches!(err, AuthError::RoleNameConflict(n) if n == "ADMIN"));
    }

    #[tokio::test]
    async fn update_renames_or_reports_conflicts() {
        let resolver = RoleResolver::new(crate::testing::seeded_store().await);
        let auditor = resolver.create("AUDITOR", Some("  read only ".into())).await.unwrap();
        assert_eq!(auditor.description.as_deref(), Some("read only"));

        let renamed = resolver.update(auditor.id, "REVIEWER", None).await.unwrap();
        assert_eq!(renamed.name, "REVIEWER");
        assert!(resolver.find_by_name("AUDITOR").await.unwrap().is_none());

        assert!(matches!(
            resolver.update(auditor.id, "USER", None).await,
            Err(AuthError::RoleNameConflict(_))
        ));
        assert!(matches!(
            resolver.update(RoleId::new(999), "GHOST", None).await,
            Err(AuthError::RoleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleted_role_is_dropped_from_holders() {
        let store = crate::testing::seeded_store().await;
        let resolver = RoleResolver::new(store.clone());
        let user_role = resolver.find_by_name("USER").await.unwrap().unwrap();

        resolver.delete(user_role.id).await.unwrap();
        assert!(resolver.find_by_id(user_role.id).await.unwrap().is_none());

        let user = store.find_user_by_email("user@example.com").await.unwrap().unwrap();
        assert!(user.roles.is_empty());
        let admin = store.find_user_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(admin.has_role("ADMIN") && !admin.has_role("USER"));

        assert!(matches!(
            resolver.delete(user_role.id).await,
            Err(AuthError::RoleNotFound(id)) if id == user_role.id
        ));
    }
}
