//! Account administration.
//!
//! Every write validates first, resolves roles all-or-nothing, and only then
//! touches the store, so a rejected request leaves nothing behind.

use std::sync::Arc;

use chrono::Utc;

use rolegate_core::{DomainError, RoleId, UserId};

use crate::error::AuthError;
use crate::password::{PasswordHasher, PasswordState};
use crate::roles::{RoleRecord, RoleResolver};
use crate::store::{CredentialStore, StoreError};
use crate::user::{normalize_email, NewUser, Profile, UserRecord};

/// Input for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
    pub password: PasswordState,
    pub role_ids: Vec<RoleId>,
    pub is_active: bool,
}

/// Replacement values for an existing account.
///
/// `password: None` keeps the stored digest.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
    pub password: Option<PasswordState>,
    pub role_ids: Vec<RoleId>,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    roles: RoleResolver,
    hasher: PasswordHasher,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher) -> Self {
        Self {
            roles: RoleResolver::new(store.clone()),
            store,
            hasher,
        }
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, AuthError> {
        Ok(self.store.list_users().await?)
    }

    pub async fn get_user(&self, id: UserId) -> Result<UserRecord, AuthError> {
        self.store.find_user_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }

    /// The account behind a login identifier.
    pub async fn current_user(&self, identifier: &str) -> Result<UserRecord, AuthError> {
        self.store
            .find_user_by_email(&normalize_email(identifier))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn create_user(&self, account: NewAccount) -> Result<UserRecord, AuthError> {
        let profile = Profile {
            first_name: account.first_name,
            last_name: account.last_name,
            age: account.age,
            email: account.email,
        }
        .validated()?;
        account.password.validate()?;
        require_roles(&account.role_ids)?;

        if self.store.find_user_by_email(&profile.email).await?.is_some() {
            return Err(AuthError::EmailConflict(profile.email));
        }

        let roles = self.roles.resolve_all(&account.role_ids).await?;
        let password_hash = account.password.encode(&self.hasher).await?;

        let mut user = NewUser {
            email: profile.email.clone(),
            password_hash,
            first_name: profile.first_name,
            last_name: profile.last_name,
            age: profile.age,
            is_active: account.is_active,
            roles: Vec::new(),
        };
        user.set_roles(roles);

        let created = self
            .store
            .create_user(user)
            .await
            .map_err(|e| email_conflict(e, &profile.email))?;
        tracing::info!(user_id = %created.id, roles = created.roles.len(), "user created");
        Ok(created)
    }

    pub async fn update_user(&self, id: UserId, update: AccountUpdate) -> Result<UserRecord, AuthError> {
        let profile = Profile {
            first_name: update.first_name,
            last_name: update.last_name,
            age: update.age,
            email: update.email,
        }
        .validated()?;
        if let Some(password) = &update.password {
            password.validate()?;
        }
        require_roles(&update.role_ids)?;

        let mut user = self.get_user(id).await?;

        if profile.email != user.email {
            if let Some(other) = self.store.find_user_by_email(&profile.email).await? {
                if other.id != id {
                    return Err(AuthError::EmailConflict(profile.email));
                }
            }
        }

        let roles = self.roles.resolve_all(&update.role_ids).await?;
        if let Some(password) = update.password {
            user.password_hash = password.encode(&self.hasher).await?;
        }

        user.email = profile.email.clone();
        user.first_name = profile.first_name;
        user.last_name = profile.last_name;
        user.age = profile.age;
        user.is_active = update.is_active;
        user.set_roles(roles);

        let saved = self.save(user).await.map_err(|e| match e {
            AuthError::Store(store) => email_conflict(store, &profile.email),
            other => other,
        })?;
        tracing::info!(user_id = %saved.id, "user updated");
        Ok(saved)
    }

    pub async fn set_active(&self, id: UserId, active: bool) -> Result<UserRecord, AuthError> {
        let mut user = self.get_user(id).await?;
        user.is_active = active;
        let saved = self.save(user).await?;
        tracing::info!(user_id = %saved.id, active, "user activation changed");
        Ok(saved)
    }

    /// Replace the user's role set. Nothing is written if any id is unknown.
    pub async fn assign_roles(&self, id: UserId, role_ids: &[RoleId]) -> Result<UserRecord, AuthError> {
        let mut user = self.get_user(id).await?;
        let roles: Vec<RoleRecord> = self.roles.resolve_all(role_ids).await?;
        user.set_roles(roles);
        self.save(user).await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), AuthError> {
        if !self.store.delete_user(id).await? {
            return Err(AuthError::UserNotFound);
        }
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn save(&self, mut user: UserRecord) -> Result<UserRecord, AuthError> {
        user.updated_at = Utc::now();
        match self.store.save_user(user).await {
            Ok(saved) => Ok(saved),
            Err(StoreError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

fn require_roles(ids: &[RoleId]) -> Result<(), DomainError> {
    if ids.is_empty() {
        return Err(DomainError::validation("at least one role must be selected"));
    }
    Ok(())
}

fn email_conflict(err: StoreError, email: &str) -> AuthError {
    match err {
        StoreError::UniqueViolation { .. } => AuthError::EmailConflict(email.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::MIN_COST;
    use crate::testing::{seeded_store, MemoryStore};

    async fn service() -> (Arc<MemoryStore>, AccountService) {
        let store = seeded_store().await;
        let service = AccountService::new(store.clone(), PasswordHasher::new(MIN_COST).unwrap());
        (store, service)
    }

    async fn role_id(service: &AccountService, name: &str) -> RoleId {
        service.roles().find_by_name(name).await.unwrap().unwrap().id
    }

    fn account(email: &str, role_ids: Vec<RoleId>) -> NewAccount {
        NewAccount {
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            age: 30,
            email: email.into(),
            password: PasswordState::plaintext("s3cret"),
            role_ids,
            is_active: true,
        }
    }

    fn update_from(user: &UserRecord) -> AccountUpdate {
        AccountUpdate {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            age: user.age,
            email: user.email.clone(),
            password: None,
            role_ids: user.role_ids(),
            is_active: user.is_active,
        }
    }

    #[tokio::test]
    async fn create_hashes_password_and_resolves_roles() {
        let (_, service) = service().await;
        let user_role = role_id(&service, "USER").await;

        let created = service
            .create_user(account(" Alice@Example.com", vec![user_role, user_role]))
            .await
            .unwrap();

        assert_eq!(created.email, "alice@example.com");
        assert_ne!(created.password_hash.as_str(), "s3cret");
        assert!(PasswordHasher::new(MIN_COST).unwrap().verify("s3cret", &created.password_hash));
        assert_eq!(created.roles.len(), 1);
        assert!(created.has_role("USER"));
    }

    #[tokio::test]
    async fn create_requires_a_role_and_a_free_email() {
        let (_, service) = service().await;
        let err = service.create_user(account("new@example.com", vec![])).await.unwrap_err();
        assert!(matches!(err, AuthError::Domain(DomainError::Validation(m)) if m.contains("at least one role")));

        let user_role = role_id(&service, "USER").await;
        let err = service
            .create_user(account("ADMIN@example.com", vec![user_role]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailConflict(e) if e == "admin@example.com"));
    }

    #[tokio::test]
    async fn unknown_role_aborts_creation() {
        let (store, service) = service().await;
        let before = store.list_users().await.unwrap().len();
        let user_role = role_id(&service, "USER").await;

        let err = service
            .create_user(account("new@example.com", vec![user_role, RoleId::new(999)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RoleNotFound(id) if id == RoleId::new(999)));
        assert_eq!(store.list_users().await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn assign_roles_is_all_or_nothing() {
        let (_, service) = service().await;
        let user = service.current_user("user@example.com").await.unwrap();
        let admin_role = role_id(&service, "ADMIN").await;

        let err = service
            .assign_roles(user.id, &[admin_role, RoleId::new(999)])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RoleNotFound(_)));
        let unchanged = service.get_user(user.id).await.unwrap();
        assert_eq!(unchanged.role_ids(), user.role_ids());

        let updated = service.assign_roles(user.id, &[admin_role]).await.unwrap();
        assert!(updated.has_role("ADMIN"));
        assert!(!updated.has_role("USER"));
    }

    #[tokio::test]
    async fn update_without_password_keeps_digest() {
        let (_, service) = service().await;
        let user = service.current_user("user@example.com").await.unwrap();

        let mut update = update_from(&user);
        update.first_name = "Renamed".into();
        let saved = service.update_user(user.id, update).await.unwrap();
        assert_eq!(saved.first_name, "Renamed");
        assert_eq!(saved.password_hash, user.password_hash);

        let mut update = update_from(&saved);
        update.password = Some(PasswordState::plaintext("changed"));
        let saved = service.update_user(user.id, update).await.unwrap();
        assert_ne!(saved.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let (_, service) = service().await;
        let user = service.current_user("user@example.com").await.unwrap();
        let mut update = update_from(&user);
        update.email = "admin@example.com".into();
        let err = service.update_user(user.id, update).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailConflict(_)));
    }

    #[tokio::test]
    async fn disable_enable_and_delete() {
        let (_, service) = service().await;
        let user = service.current_user("user@example.com").await.unwrap();

        assert!(!service.set_active(user.id, false).await.unwrap().is_active);
        assert!(service.set_active(user.id, true).await.unwrap().is_active);

        service.delete_user(user.id).await.unwrap();
        assert!(matches!(service.get_user(user.id).await, Err(AuthError::UserNotFound)));
        assert!(matches!(service.delete_user(user.id).await, Err(AuthError::UserNotFound)));
        assert!(matches!(
            service.set_active(user.id, true).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
