//! Authentication and administration error taxonomy.

use thiserror::Error;

use rolegate_core::{DomainError, RoleId};

use crate::store::StoreError;

/// User-visible message for unknown users and wrong secrets alike.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password.";

/// User-visible message for disabled accounts.
pub const ACCOUNT_DISABLED_MESSAGE: &str =
    "Your account has been disabled. Please contact your administrator for assistance.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("account disabled")]
    AccountDisabled,

    #[error("bad credentials")]
    BadCredentials,

    #[error("role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("role name already exists: {0}")]
    RoleNameConflict(String),

    #[error("user already exists with email: {0}")]
    EmailConflict(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// What a login form is allowed to learn about a failed attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    InvalidCredentials,
    Disabled,
}

impl LoginFailure {
    pub fn message(&self) -> &'static str {
        match self {
            LoginFailure::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE,
            LoginFailure::Disabled => ACCOUNT_DISABLED_MESSAGE,
        }
    }

    /// Stable short code (used in cookies and JSON error bodies).
    pub fn code(&self) -> &'static str {
        match self {
            LoginFailure::InvalidCredentials => "invalid_credentials",
            LoginFailure::Disabled => "account_disabled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_credentials" => Some(LoginFailure::InvalidCredentials),
            "account_disabled" => Some(LoginFailure::Disabled),
            _ => None,
        }
    }
}

impl AuthError {
    /// Collapse credential failures into what the login surface may reveal.
    ///
    /// Returns `None` for failures that are not about the submitted
    /// credentials (store outages, hashing failures, ...).
    pub fn login_failure(&self) -> Option<LoginFailure> {
        match self {
            AuthError::UserNotFound | AuthError::BadCredentials => {
                Some(LoginFailure::InvalidCredentials)
            }
            AuthError::AccountDisabled => Some(LoginFailure::Disabled),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self.login_failure() {
            Some(failure) => failure.message().to_string(),
            None => self.to_string(),
        }
    }
}
