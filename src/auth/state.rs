//! Auth configuration and the shared, read-only auth state.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

use super::{hasher::CredentialHasher, token::TokenCodec};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session signing secret is missing")]
    MissingSecret,
    #[error("session signing secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,
    #[error("session TTL must be greater than zero")]
    ZeroSessionTtl,
    #[error("invalid password hash parameters: {0}")]
    HashParams(String),
}

/// Argon2id cost parameters used for new digests.
///
/// Existing digests carry their own parameters, so changing these never
/// invalidates stored passwords.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Process-wide auth configuration, built once at startup.
#[derive(Clone)]
pub struct AuthConfig {
    session_secret: SecretString,
    session_ttl_seconds: u64,
    secure_cookies: bool,
    hash_cost: HashCost,
}

impl AuthConfig {
    /// # Errors
    ///
    /// Returns an error if the secret is empty or shorter than 32 bytes.
    pub fn new(session_secret: SecretString) -> Result<Self, ConfigError> {
        let length = session_secret.expose_secret().len();
        if length == 0 {
            return Err(ConfigError::MissingSecret);
        }
        if length < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret);
        }

        Ok(Self {
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            secure_cookies: false,
            hash_cost: HashCost::default(),
        })
    }

    #[must_use]
    pub const fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub const fn with_hash_cost(mut self, cost: HashCost) -> Self {
        self.hash_cost = cost;
        self
    }

    pub(crate) const fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    #[must_use]
    pub const fn hash_cost(&self) -> HashCost {
        self.hash_cost
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("secure_cookies", &self.secure_cookies)
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

/// Everything the auth flows share. Read-only after startup.
#[derive(Clone, Debug)]
pub struct AuthState {
    config: AuthConfig,
    hasher: CredentialHasher,
    tokens: TokenCodec,
}

impl AuthState {
    /// # Errors
    ///
    /// Returns an error if the TTL is zero or the hash parameters are rejected.
    pub fn new(config: AuthConfig) -> Result<Self, ConfigError> {
        if config.session_ttl_seconds == 0 {
            return Err(ConfigError::ZeroSessionTtl);
        }
        let hasher = CredentialHasher::new(config.hash_cost())?;
        let tokens = TokenCodec::new(config.session_secret())?;
        Ok(Self {
            config,
            hasher,
            tokens,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_rejects_missing_or_short_secret() {
        assert_eq!(
            AuthConfig::new(SecretString::from(String::new())).err(),
            Some(ConfigError::MissingSecret)
        );
        assert_eq!(
            AuthConfig::new(SecretString::from("too-short".to_string())).err(),
            Some(ConfigError::WeakSecret)
        );
    }

    #[test]
    fn auth_config_debug_redacts_secret() -> anyhow::Result<()> {
        let secret = "a-very-long-secret-value-for-tests-only";
        let config = AuthConfig::new(SecretString::from(secret.to_string()))?;
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(secret));
        assert!(rendered.contains("***"));
        Ok(())
    }

    #[test]
    fn auth_state_rejects_zero_ttl_and_bad_cost() -> anyhow::Result<()> {
        let config = AuthConfig::new(SecretString::from("x".repeat(32)))?;

        let zero_ttl = AuthState::new(config.clone().with_session_ttl_seconds(0));
        assert_eq!(zero_ttl.err(), Some(ConfigError::ZeroSessionTtl));

        let bad_cost = AuthState::new(config.with_hash_cost(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        }));
        assert!(matches!(bad_cost, Err(ConfigError::HashParams(_))));
        Ok(())
    }
}
