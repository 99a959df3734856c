//! Credential verification.

use std::sync::Arc;

use rolegate_core::UserId;

use crate::error::AuthError;
use crate::password::{PasswordHash, PasswordHasher};
use crate::principal::{build, Principal};
use crate::store::CredentialStore;
use crate::user::normalize_email;

/// Secret hashed once at startup so unknown identifiers cost a full verify.
const DUMMY_SECRET: &str = "rolegate-dummy-secret";

/// Turns `(identifier, secret)` into a [`Principal`].
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    hide_user_not_found: bool,
    dummy_hash: PasswordHash,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash(DUMMY_SECRET)?;
        Ok(Self {
            store,
            hasher,
            hide_user_not_found: true,
            dummy_hash,
        })
    }

    /// When set (the default), an unknown identifier reports
    /// [`AuthError::BadCredentials`] instead of [`AuthError::UserNotFound`].
    pub fn with_hide_user_not_found(mut self, hide: bool) -> Self {
        self.hide_user_not_found = hide;
        self
    }

    pub fn hasher(&self) -> PasswordHasher {
        self.hasher
    }

    /// Verify a login attempt.
    ///
    /// The disabled check runs before the secret is compared, so a disabled
    /// account reports [`AuthError::AccountDisabled`] whatever was typed.
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Principal, AuthError> {
        let email = normalize_email(identifier);

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            let _ = self
                .hasher
                .verify_async(secret.to_string(), self.dummy_hash.clone())
                .await;
            tracing::info!(identifier = %email, "authentication failed: unknown identifier");
            return Err(if self.hide_user_not_found {
                AuthError::BadCredentials
            } else {
                AuthError::UserNotFound
            });
        };

        if !user.is_active {
            tracing::info!(user_id = %user.id, "authentication refused: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        let matches = self
            .hasher
            .verify_async(secret.to_string(), user.password_hash.clone())
            .await;
        if !matches {
            tracing::info!(user_id = %user.id, "authentication failed: bad credentials");
            return Err(AuthError::BadCredentials);
        }

        let principal = build(&user);
        tracing::info!(
            user_id = %user.id,
            authorities = principal.authorities().len(),
            "authentication succeeded"
        );
        Ok(principal)
    }

    /// Rebuild the principal behind an existing session.
    ///
    /// `None` when the user has since been deleted.
    pub async fn load_principal(&self, user_id: UserId) -> Result<Option<Principal>, AuthError> {
        Ok(self.store.find_user_by_id(user_id).await?.map(|u| build(&u)))
    }
}
