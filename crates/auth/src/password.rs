//! Password hashing (bcrypt).
//!
//! The hasher is a stateless hash/verify pair. It cannot tell a digest from a
//! secret, so password-bearing input is tagged with [`PasswordState`] and
//! encoded exactly once.

use rolegate_core::DomainError;

use crate::error::AuthError;

/// Default bcrypt work factor.
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Lowest work factor bcrypt accepts (tests use it).
pub const MIN_COST: u32 = 4;

pub const MAX_COST: u32 = 31;

/// bcrypt only looks at the first 72 bytes of a secret.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Encoded bcrypt digest (`$2b$<cost>$<salt+hash>`).
///
/// Never printed: `Debug` is redacted and there is no serde impl.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a digest read back from storage.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Password input tagged with whether it still needs encoding.
#[derive(Clone)]
pub enum PasswordState {
    Plaintext(String),
    AlreadyHashed(PasswordHash),
}

impl core::fmt::Debug for PasswordState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PasswordState::Plaintext(_) => f.write_str("Plaintext(<redacted>)"),
            PasswordState::AlreadyHashed(_) => f.write_str("AlreadyHashed(<redacted>)"),
        }
    }
}

impl PasswordState {
    pub fn plaintext(secret: impl Into<String>) -> Self {
        PasswordState::Plaintext(secret.into())
    }

    /// Reject plaintext secrets bcrypt cannot represent faithfully.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            PasswordState::Plaintext(secret) => {
                if secret.trim().is_empty() {
                    return Err(DomainError::validation("password is required"));
                }
                if secret.len() > MAX_PASSWORD_BYTES {
                    return Err(DomainError::validation(format!(
                        "password must be at most {MAX_PASSWORD_BYTES} bytes"
                    )));
                }
                Ok(())
            }
            PasswordState::AlreadyHashed(_) => Ok(()),
        }
    }

    /// Produce the digest to store, hashing only if the input is plaintext.
    pub async fn encode(self, hasher: &PasswordHasher) -> Result<PasswordHash, AuthError> {
        match self {
            PasswordState::Plaintext(secret) => hasher.hash_async(secret).await,
            PasswordState::AlreadyHashed(hash) => Ok(hash),
        }
    }
}

/// bcrypt hasher with a fixed work factor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, DomainError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(DomainError::validation(format!(
                "bcrypt cost must be between {MIN_COST} and {MAX_COST}, got {cost}"
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Salted one-way digest of `secret`.
    pub fn hash(&self, secret: &str) -> Result<PasswordHash, AuthError> {
        bcrypt::hash(secret, self.cost)
            .map(PasswordHash)
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Constant-time comparison of `secret` against `hashed`.
    ///
    /// A malformed digest never verifies.
    pub fn verify(&self, secret: &str, hashed: &PasswordHash) -> bool {
        match bcrypt::verify(secret, hashed.as_str()) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash could not be parsed");
                false
            }
        }
    }

    /// [`PasswordHasher::hash`] on the blocking pool.
    pub async fn hash_async(&self, secret: String) -> Result<PasswordHash, AuthError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AuthError::Hashing(format!("task join error: {e}")))?
    }

    /// [`PasswordHasher::verify`] on the blocking pool.
    pub async fn verify_async(&self, secret: String, hashed: PasswordHash) -> bool {
        let hasher = *self;
        match tokio::task::spawn_blocking(move || hasher.verify(&secret, &hashed)).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "password verification task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::new(MIN_COST).unwrap()
    }

    #[test]
    fn hash_is_salted_bcrypt() {
        let hasher = fast();
        let a = hasher.hash("admin").unwrap();
        let b = hasher.hash("admin").unwrap();
        assert!(a.as_str().starts_with("$2b$04$"));
        assert_ne!(a, b);
        assert_ne!(a.as_str(), "admin");
    }

    #[test]
    fn verify_rejects_other_secrets_and_garbage_hashes() {
        let hasher = fast();
        let hash = hasher.hash("CaseSensitive1").unwrap();
        assert!(hasher.verify("CaseSensitive1", &hash));
        assert!(!hasher.verify("casesensitive1", &hash));
        assert!(!hasher.verify("CaseSensitive1", &PasswordHash::from_encoded("not-a-hash")));
    }

    #[test]
    fn cost_out_of_range_is_rejected() {
        assert!(PasswordHasher::new(3).is_err());
        assert!(PasswordHasher::new(32).is_err());
        assert_eq!(PasswordHasher::default().cost(), DEFAULT_COST);
    }

    #[test]
    fn debug_output_never_contains_secrets() {
        let hash = fast().hash("hunter2").unwrap();
        assert!(!format!("{hash:?}").contains("$2b$"));
        assert!(!format!("{:?}", PasswordState::plaintext("hunter2")).contains("hunter2"));
    }

    #[test]
    fn plaintext_validation() {
        assert!(PasswordState::plaintext("   ").validate().is_err());
        assert!(PasswordState::plaintext("x".repeat(73)).validate().is_err());
        assert!(PasswordState::plaintext("x".repeat(72)).validate().is_ok());
    }

    #[tokio::test]
    async fn already_hashed_input_is_not_encoded_again() {
        let hasher = fast();
        let hash = hasher.hash("user").unwrap();
        let stored = PasswordState::AlreadyHashed(hash.clone())
            .encode(&hasher)
            .await
            .unwrap();
        assert_eq!(stored, hash);

        let fresh = PasswordState::plaintext("user").encode(&hasher).await.unwrap();
        assert!(hasher.verify_async("user".into(), fresh).await);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 8,
            ..ProptestConfig::default()
        })]

        /// Property: hash then verify accepts the secret and rejects any other one.
        #[test]
        fn hash_verify_round_trip(
            secret in "[ -~]{1,40}",
            other in "[ -~]{1,40}",
        ) {
            let hasher = fast();
            let hash = hasher.hash(&secret).unwrap();
            prop_assert!(hasher.verify(&secret, &hash));
            if other != secret {
                prop_assert!(!hasher.verify(&other, &hash));
            }
        }
    }
}
