use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_auth::{
    CredentialStore, NewRole, NewUser, PasswordHash, Photo, RoleRecord, StoreError, UniqueField,
    UserRecord,
};
use rolegate_core::{RoleId, UserId};

/// User row; roles are referenced by id like a join table.
#[derive(Debug, Clone)]
struct UserRow {
    email: String,
    password_hash: PasswordHash,
    first_name: String,
    last_name: String,
    age: i32,
    is_active: bool,
    role_ids: Vec<RoleId>,
    photo: Option<Photo>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRow>,
    roles: BTreeMap<RoleId, RoleRecord>,
    last_user_id: i64,
    last_role_id: i64,
}

impl Tables {
    fn hydrate(&self, id: UserId, row: &UserRow) -> UserRecord {
        UserRecord {
            id,
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            age: row.age,
            is_active: row.is_active,
            // Roles deleted underneath a user simply drop out.
            roles: row
                .role_ids
                .iter()
                .filter_map(|rid| self.roles.get(rid).cloned())
                .collect(),
            photo: row.photo.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .iter()
            .any(|(id, row)| row.email == email && Some(*id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn known_role_ids(&self, roles: &[RoleRecord]) -> Vec<RoleId> {
        roles
            .iter()
            .map(|r| r.id)
            .filter(|id| self.roles.contains_key(id))
            .collect()
    }
}

/// In-memory credential store.
///
/// Intended for tests/dev and for running without a database. Each call takes
/// the lock once, so single-record reads and writes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .users
            .iter()
            .find(|(_, row)| row.email == email)
            .map(|(id, row)| tables.hydrate(*id, row)))
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables.users.get(&id).map(|row| tables.hydrate(id, row)))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .users
            .iter()
            .map(|(id, row)| tables.hydrate(*id, row))
            .collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.write()?;
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::UniqueViolation {
                field: UniqueField::Email,
                value: user.email,
            });
        }

        tables.last_user_id += 1;
        let id = UserId::new(tables.last_user_id);
        let now = Utc::now();
        let row = UserRow {
            role_ids: tables.known_role_ids(&user.roles),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            is_active: user.is_active,
            photo: None,
            created_at: now,
            updated_at: now,
        };
        let record = tables.hydrate(id, &row);
        tables.users.insert(id, row);
        Ok(record)
    }

    async fn save_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        let mut tables = self.write()?;
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::UniqueViolation {
                field: UniqueField::Email,
                value: user.email,
            });
        }
        let role_ids = tables.known_role_ids(&user.roles);
        let Some(row) = tables.users.get_mut(&user.id) else {
            return Err(StoreError::NotFound);
        };

        *row = UserRow {
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            is_active: user.is_active,
            role_ids,
            photo: user.photo,
            created_at: row.created_at,
            updated_at: user.updated_at,
        };
        let row = row.clone();
        Ok(tables.hydrate(user.id, &row))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.write()?.users.remove(&id).is_some())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        Ok(self.read()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn find_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<RoleRecord>, StoreError> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.roles.get(id).cloned())
            .collect())
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn create_role(&self, role: NewRole) -> Result<RoleRecord, StoreError> {
        let mut tables = self.write()?;
        if tables.role_name_taken(&role.name, None) {
            return Err(StoreError::UniqueViolation {
                field: UniqueField::RoleName,
                value: role.name,
            });
        }

        tables.last_role_id += 1;
        let now = Utc::now();
        let record = RoleRecord {
            id: RoleId::new(tables.last_role_id),
            name: role.name,
            description: role.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn save_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError> {
        let mut tables = self.write()?;
        if tables.role_name_taken(&role.name, Some(role.id)) {
            return Err(StoreError::UniqueViolation {
                field: UniqueField::RoleName,
                value: role.name,
            });
        }
        let Some(existing) = tables.roles.get_mut(&role.id) else {
            return Err(StoreError::NotFound);
        };
        existing.name = role.name;
        existing.description = role.description;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables.roles.remove(&id).is_none() {
            return Ok(false);
        }
        for row in tables.users.values_mut() {
            row.role_ids.retain(|rid| *rid != id);
        }
        Ok(true)
    }
}
