//! Postgres-backed credential store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation on `users_email_key`) | `23505` | `UniqueViolation { field: Email }` |
//! | Database (unique violation on `roles_name_key`) | `23505` | `UniqueViolation { field: RoleName }` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / network / decode | N/A | `Backend` |
//!
//! Role membership lives in `users_roles`; a user save rewrites the user's
//! rows there inside the same transaction as the user update.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use rolegate_auth::{
    CredentialStore, NewRole, NewUser, PasswordHash, Photo, RoleRecord, StoreError, UniqueField,
    UserRecord,
};
use rolegate_core::{RoleId, UserId};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const USER_COLUMNS: &str = r#"
    id, email, password_hash, first_name, last_name, age, is_active,
    photo, photo_content_type, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it does not exist yet. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Attach roles to freshly loaded user rows.
    async fn hydrate(&self, rows: Vec<UserRow>) -> Result<Vec<UserRecord>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let role_rows = sqlx::query(
            r#"
            SELECT ur.user_id, r.id, r.name, r.description, r.created_at, r.updated_at
            FROM users_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_user_roles", e))?;

        let mut by_user: HashMap<i64, Vec<RoleRecord>> = HashMap::new();
        for row in role_rows {
            let user_id: i64 = row
                .try_get("user_id")
                .map_err(|e| map_sqlx_error("load_user_roles", e))?;
            let role = RoleRow::from_row(&row).map_err(|e| map_sqlx_error("load_user_roles", e))?;
            by_user.entry(user_id).or_default().push(role.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let roles = by_user.remove(&row.id).unwrap_or_default();
                row.into_record(roles)
            })
            .collect())
    }

    async fn fetch_one_user(&self, operation: &str, sql: &str, bind: UserKey<'_>) -> Result<Option<UserRecord>, StoreError> {
        let query = sqlx::query(sql);
        let query = match bind {
            UserKey::Id(id) => query.bind(id),
            UserKey::Email(email) => query.bind(email),
        };
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = UserRow::from_row(&row).map_err(|e| map_sqlx_error(operation, e))?;
        Ok(self.hydrate(vec![user]).await?.into_iter().next())
    }

    async fn reload(&self, operation: &str, id: i64) -> Result<UserRecord, StoreError> {
        self.find_user_by_id(UserId::new(id))
            .await?
            .ok_or_else(|| StoreError::backend(format!("{operation}: user {id} vanished after commit")))
    }
}

enum UserKey<'a> {
    Id(i64),
    Email(&'a str),
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.fetch_one_user("find_user_by_email", &sql, UserKey::Email(email))
            .await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_one_user("find_user_by_id", &sql, UserKey::Id(id.get()))
            .await
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(UserRow::from_row(&row).map_err(|e| map_sqlx_error("list_users", e))?);
        }
        self.hydrate(users).await
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, age, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.age)
        .bind(user.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error("insert_user", e, &user.email))?;
        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("insert_user", e))?;

        replace_roles(&mut tx, id, &user.roles).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        self.reload("create_user", id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn save_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let (photo, photo_content_type) = match &user.photo {
            Some(p) => (Some(p.bytes.as_slice()), Some(p.content_type.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2,
                password_hash = $3,
                first_name = $4,
                last_name = $5,
                age = $6,
                is_active = $7,
                photo = $8,
                photo_content_type = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(user.id.get())
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.age)
        .bind(user.is_active)
        .bind(photo)
        .bind(photo_content_type)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error("update_user", e, &user.email))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        }

        replace_roles(&mut tx, user.id.get(), &user.roles).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        self.reload("save_user", user.id.get()).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_role_by_name", e))?;
        row.map(|r| role_from_row("find_role_by_name", &r)).transpose()
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_role_by_id", e))?;
        row.map(|r| role_from_row("find_role_by_id", &r)).transpose()
    }

    async fn find_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<RoleRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM roles
            WHERE id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_roles_by_ids", e))?;
        rows.iter()
            .map(|r| role_from_row("find_roles_by_ids", r))
            .collect()
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter().map(|r| role_from_row("list_roles", r)).collect()
    }

    #[instrument(skip(self, role), fields(role = %role.name), err)]
    async fn create_role(&self, role: NewRole) -> Result<RoleRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_write_error("insert_role", e, &role.name))?;
        role_from_row("insert_role", &row)
    }

    #[instrument(skip(self, role), fields(role_id = %role.id), err)]
    async fn save_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(role.id.get())
        .bind(&role.name)
        .bind(&role.description)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_write_error("update_role", e, &role.name))?;
        match row {
            Some(row) => role_from_row("update_role", &row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        // users_roles rows go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Rewrite the user's `users_roles` rows.
async fn replace_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    roles: &[RoleRecord],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM users_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("clear_user_roles", e))?;

    if roles.is_empty() {
        return Ok(());
    }
    let role_ids: Vec<i64> = roles.iter().map(|r| r.id.get()).collect();
    sqlx::query(
        r#"
        INSERT INTO users_roles (user_id, role_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&role_ids)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_user_roles", e))?;
    Ok(())
}

fn role_from_row(operation: &str, row: &PgRow) -> Result<RoleRecord, StoreError> {
    RoleRow::from_row(row)
        .map(Into::into)
        .map_err(|e| map_sqlx_error(operation, e))
}

/// Map a write failure, naming the offending value on unique violations.
fn map_write_error(operation: &str, err: sqlx::Error, value: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let field = match db_err.constraint() {
                Some("roles_name_key") => Some(UniqueField::RoleName),
                Some("users_email_key") => Some(UniqueField::Email),
                _ => None,
            };
            if let Some(field) = field {
                return StoreError::UniqueViolation {
                    field,
                    value: value.to_string(),
                };
            }
        }
    }
    map_sqlx_error(operation, err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::backend(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::backend(format!("sqlx error in {operation}: {other}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    age: i32,
    is_active: bool,
    photo: Option<Vec<u8>>,
    photo_content_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            age: row.try_get("age")?,
            is_active: row.try_get("is_active")?,
            photo: row.try_get("photo")?,
            photo_content_type: row.try_get("photo_content_type")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl UserRow {
    fn into_record(self, roles: Vec<RoleRecord>) -> UserRecord {
        let photo = match (self.photo, self.photo_content_type) {
            (Some(bytes), Some(content_type)) => Some(Photo { content_type, bytes }),
            (Some(bytes), None) => Some(Photo {
                content_type: "application/octet-stream".to_string(),
                bytes,
            }),
            _ => None,
        };
        let mut record = UserRecord {
            id: UserId::new(self.id),
            email: self.email,
            password_hash: PasswordHash::from_encoded(self.password_hash),
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            is_active: self.is_active,
            roles: Vec::new(),
            photo,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        record.set_roles(roles);
        record
    }
}

#[derive(Debug)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for RoleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RoleRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<RoleRow> for RoleRecord {
    fn from(row: RoleRow) -> Self {
        RoleRecord {
            id: RoleId::new(row.id),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
