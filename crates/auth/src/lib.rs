//! `rolegate-auth`: authentication and route authorization core.
//!
//! Decoupled from HTTP and storage: persistence comes in through
//! [`CredentialStore`], requests through [`HttpMethod`] and a path.

pub mod accounts;
pub mod authenticate;
pub mod authority;
pub mod authorize;
pub mod error;
pub mod password;
pub mod principal;
pub mod roles;
pub mod session;
pub mod store;
pub mod user;

#[cfg(test)]
mod testing;

pub use accounts::{AccountService, AccountUpdate, NewAccount};
pub use authenticate::Authenticator;
pub use authority::{Authority, ROLE_ADMIN, ROLE_USER};
pub use authorize::{
    decide, explain, Access, Decision, DecisionExplanation, DenyReason, HttpMethod, RouteRule,
    RouteTable,
};
pub use error::{AuthError, LoginFailure};
pub use password::{PasswordHash, PasswordHasher, PasswordState};
pub use principal::{build, Principal, PrincipalView};
pub use roles::{authority_of, NewRole, RoleRecord, RoleResolver};
pub use session::{validate_session, SessionClaims, SessionError, SessionId};
pub use store::{CredentialStore, StoreError, UniqueField};
pub use user::{normalize_email, NewUser, Photo, UserRecord};
