//! Service wiring: credential store, authenticator, account service, sessions.

use std::sync::Arc;

use anyhow::Context;

use rolegate_auth::{AccountService, Authenticator, CredentialStore, PasswordHasher, RoleResolver};
use rolegate_infra::{seed_defaults, AppConfig, InMemoryCredentialStore, PostgresCredentialStore};

use crate::cookies::CookiePolicy;
use crate::sessions::SessionRegistry;

/// Everything a request handler may need, built once at startup.
pub struct AppServices {
    pub store: Arc<dyn CredentialStore>,
    pub authenticator: Authenticator,
    pub accounts: AccountService,
    pub sessions: SessionRegistry,
    pub cookies: CookiePolicy,
}

impl AppServices {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher, config: &AppConfig) -> anyhow::Result<Self> {
        let authenticator =
            Authenticator::new(store.clone(), hasher).context("failed to initialize authenticator")?;
        Ok(Self {
            accounts: AccountService::new(store.clone(), hasher),
            authenticator,
            sessions: SessionRegistry::new(chrono::Duration::minutes(config.session_ttl_minutes)),
            cookies: CookiePolicy {
                secure: config.secure_cookies,
                session_max_age_minutes: config.session_ttl_minutes,
            },
            store,
        })
    }

    pub fn roles(&self) -> &RoleResolver {
        self.accounts.roles()
    }
}

/// Connect the configured store, seed it, and assemble the services.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn CredentialStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresCredentialStore::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply schema")?;
            tracing::info!("using Postgres credential store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory credential store");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let hasher = PasswordHasher::new(config.bcrypt_cost).context("invalid bcrypt cost")?;

    let report = seed_defaults(store.clone(), hasher, config.seed_demo_accounts)
        .await
        .context("startup seeding failed")?;
    if !report.created_accounts.is_empty() {
        tracing::info!(accounts = ?report.created_accounts, "demo accounts created");
    }

    AppServices::new(store, hasher, config)
}
