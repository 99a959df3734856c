//! Minimal in-process store for unit tests of the auth services.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use rolegate_core::{RoleId, UserId};

use crate::password::{PasswordHasher, MIN_COST};
use crate::roles::{NewRole, RoleRecord};
use crate::store::{CredentialStore, StoreError, UniqueField};
use crate::user::{NewUser, UserRecord};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<(Vec<UserRecord>, Vec<RoleRecord>)>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// While set, every call fails with `StoreError::Backend`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection refused"));
        }
        Ok(())
    }

    pub async fn set_active(&self, email: &str, active: bool) {
        let mut guard = self.inner.lock().unwrap();
        let user = guard.0.iter_mut().find(|u| u.email == email).unwrap();
        user.is_active = active;
    }
}

/// Roles ADMIN(1), USER(2); admin@example.com/admin and user@example.com/user.
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    let hasher = PasswordHasher::new(MIN_COST).unwrap();

    let admin = store
        .create_role(NewRole { name: "ADMIN".into(), description: None })
        .await
        .unwrap();
    let user = store
        .create_role(NewRole { name: "USER".into(), description: None })
        .await
        .unwrap();

    for (email, secret, roles) in [
        ("admin@example.com", "admin", vec![admin.clone(), user.clone()]),
        ("user@example.com", "user", vec![user.clone()]),
    ] {
        let mut new = NewUser {
            email: email.into(),
            password_hash: hasher.hash(secret).unwrap(),
            first_name: "Seed".into(),
            last_name: "Account".into(),
            age: 30,
            is_active: true,
            roles: Vec::new(),
        };
        new.set_roles(roles);
        store.create_user(new).await.unwrap();
    }
    store
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().0.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().0.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().0.clone())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.check()?;
        let mut guard = self.inner.lock().unwrap();
        if guard.0.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation { field: UniqueField::Email, value: user.email });
        }
        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(guard.0.iter().map(|u| u.id.get()).max().unwrap_or(0) + 1),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            is_active: user.is_active,
            roles: user.roles,
            photo: None,
            created_at: now,
            updated_at: now,
        };
        guard.0.push(record.clone());
        Ok(record)
    }

    async fn save_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        self.check()?;
        let mut guard = self.inner.lock().unwrap();
        if guard.0.iter().any(|u| u.email == user.email && u.id != user.id) {
            return Err(StoreError::UniqueViolation { field: UniqueField::Email, value: user.email });
        }
        let slot = guard.0.iter_mut().find(|u| u.id == user.id).ok_or(StoreError::NotFound)?;
        *slot = user.clone();
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        self.check()?;
        let mut guard = self.inner.lock().unwrap();
        let before = guard.0.len();
        guard.0.retain(|u| u.id != id);
        Ok(guard.0.len() != before)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().1.iter().find(|r| r.name == name).cloned())
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().1.iter().find(|r| r.id == id).cloned())
    }

    async fn find_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<RoleRecord>, StoreError> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .1
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().1.clone())
    }

    async fn create_role(&self, role: NewRole) -> Result<RoleRecord, StoreError> {
        self.check()?;
        let mut guard = self.inner.lock().unwrap();
        if guard.1.iter().any(|r| r.name == role.name) {
            return Err(StoreError::UniqueViolation { field: UniqueField::RoleName, value: role.name });
        }
        let now = Utc::now();
        let record = RoleRecord {
            id: RoleId::new(guard.1.len() as i64 + 1),
            name: role.name,
            description: role.description,
            created_at: now,
            updated_at: now,
        };
        guard.1.push(record.clone());
        Ok(record)
    }

    async fn save_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError> {
        self.check()?;
        let mut guard = self.inner.lock().unwrap();
        if guard.1.iter().any(|r| r.name == role.name && r.id != role.id) {
            return Err(StoreError::UniqueViolation { field: UniqueField::RoleName, value: role.name });
        }
        let slot = guard.1.iter_mut().find(|r| r.id == role.id).ok_or(StoreError::NotFound)?;
        *slot = role.clone();
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        self.check()?;
        let mut guard = self.inner.lock().unwrap();
        let before = guard.1.len();
        guard.1.retain(|r| r.id != id);
        if guard.1.len() == before {
            return Ok(false);
        }
        for user in guard.0.iter_mut() {
            user.roles.retain(|r| r.id != id);
        }
        Ok(true)
    }
}
