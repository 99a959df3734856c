//! Startup seeding of the default roles and demo accounts.

use std::sync::Arc;

use rolegate_auth::{
    AccountService, AuthError, CredentialStore, NewAccount, PasswordHasher, PasswordState,
    RoleResolver,
};

pub const ADMIN_ROLE: &str = "ADMIN";
pub const USER_ROLE: &str = "USER";

struct DemoAccount {
    email: &'static str,
    password: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    roles: &'static [&'static str],
}

const DEMO_ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        email: "admin@example.com",
        password: "admin",
        first_name: "Admin",
        last_name: "User",
        roles: &[ADMIN_ROLE, USER_ROLE],
    },
    DemoAccount {
        email: "user@example.com",
        password: "user",
        first_name: "Regular",
        last_name: "User",
        roles: &[USER_ROLE],
    },
];

/// What seeding changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created_accounts: Vec<String>,
}

/// Ensure the default roles exist and, when `demo_accounts` is set, the demo
/// admin/user accounts. Existing emails are left untouched.
///
/// Runs once before the listener binds.
pub async fn seed_defaults(
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    demo_accounts: bool,
) -> Result<SeedReport, AuthError> {
    let roles = RoleResolver::new(store.clone());
    let admin = roles.ensure_exists(ADMIN_ROLE).await?;
    let user = roles.ensure_exists(USER_ROLE).await?;

    let mut report = SeedReport::default();
    if !demo_accounts {
        return Ok(report);
    }

    let accounts = AccountService::new(store.clone(), hasher);
    for demo in DEMO_ACCOUNTS {
        if store.find_user_by_email(demo.email).await?.is_some() {
            tracing::debug!(email = demo.email, "demo account already present");
            continue;
        }
        let role_ids = demo
            .roles
            .iter()
            .map(|name| if *name == ADMIN_ROLE { admin.id } else { user.id })
            .collect();

        accounts
            .create_user(NewAccount {
                first_name: demo.first_name.to_string(),
                last_name: demo.last_name.to_string(),
                age: 30,
                email: demo.email.to_string(),
                password: PasswordState::plaintext(demo.password),
                role_ids,
                is_active: true,
            })
            .await?;
        tracing::info!(email = demo.email, "seeded demo account");
        report.created_accounts.push(demo.email.to_string());
    }

    Ok(report)
}
