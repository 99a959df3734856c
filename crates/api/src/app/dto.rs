use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_auth::{authority_of, AccountUpdate, NewAccount, PasswordState, RoleRecord, UserRecord};
use rolegate_core::{DomainError, RoleId, UserId};

// -------------------------
// Envelope
// -------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

/// HTML form login (`application/x-www-form-urlencoded`).
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
    pub logout: Option<String>,
}

/// Body of `POST /api/admin/users`. Fields are optional at the serde level so
/// missing values surface as validation messages rather than decode errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub email: String,
    pub password: String,
    pub role_ids: Vec<i64>,
    pub is_active: Option<bool>,
}

impl CreateUserRequest {
    pub fn into_account(self) -> Result<NewAccount, DomainError> {
        Ok(NewAccount {
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age.ok_or_else(|| DomainError::validation("age is required"))?,
            email: self.email,
            password: PasswordState::plaintext(self.password),
            role_ids: self.role_ids.into_iter().map(RoleId::new).collect(),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Body of `PUT /api/admin/users/{id}`; a blank password keeps the current one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub email: String,
    pub password: Option<String>,
    pub role_ids: Vec<i64>,
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    /// `current_active` is kept when the body does not say otherwise.
    pub fn into_update(self, current_active: bool) -> Result<AccountUpdate, DomainError> {
        Ok(AccountUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age.ok_or_else(|| DomainError::validation("age is required"))?,
            email: self.email,
            password: self
                .password
                .filter(|p| !p.is_empty())
                .map(PasswordState::plaintext),
            role_ids: self.role_ids.into_iter().map(RoleId::new).collect(),
            is_active: self.is_active.unwrap_or(current_active),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainQuery {
    pub path: String,
    pub method: Option<String>,
    /// Explain for this user instead of the caller.
    pub user_id: Option<i64>,
    /// Explain for an anonymous request.
    #[serde(default)]
    pub anonymous: bool,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
    pub has_photo: bool,
    pub photo_content_type: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserDto {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username().to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            age: user.age,
            email: user.email.clone(),
            has_photo: user.photo.is_some(),
            photo_content_type: user.photo.as_ref().map(|p| p.content_type.clone()),
            roles: user.roles.iter().map(|r| r.name.clone()).collect(),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDto {
    pub id: RoleId,
    pub name: String,
    pub authority: String,
    pub description: Option<String>,
}

impl From<&RoleRecord> for RoleDto {
    fn from(role: &RoleRecord) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            authority: authority_of(role).as_str().to_string(),
            description: role.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: usize,
    pub admin_users: usize,
    pub regular_users: usize,
    pub active_users: usize,
    pub total_roles: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uses_camel_case_and_defaults() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Alice",
            "lastName": "Smith",
            "age": 30,
            "email": "alice@example.com",
            "password": "pw",
            "roleIds": [2, 1]
        }))
        .unwrap();
        let account = req.into_account().unwrap();
        assert_eq!(account.role_ids, vec![RoleId::new(2), RoleId::new(1)]);
        assert!(account.is_active);
    }

    #[test]
    fn missing_age_is_a_validation_error() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(req.into_account(), Err(DomainError::Validation(m)) if m.contains("age")));
    }

    #[test]
    fn blank_password_keeps_the_current_one() {
        let req: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "firstName": "A", "lastName": "B", "age": 20, "email": "a@b.c",
            "password": "", "roleIds": [1]
        }))
        .unwrap();
        let update = req.into_update(false).unwrap();
        assert!(update.password.is_none());
        assert!(!update.is_active);
    }
}
