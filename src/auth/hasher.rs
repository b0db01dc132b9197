use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tokio::task;
use tracing::{debug, instrument};

use super::state::{ConfigError, HashCost};

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("hashing task failed: {0}")]
    Join(#[from] task::JoinError),
}

/// Argon2id password hashing.
///
/// Digests are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`) so
/// verification reads the parameters back from the digest itself. Both
/// operations run on the blocking pool.
#[derive(Clone, Debug)]
pub struct CredentialHasher {
    params: Params,
    decoy: String,
}

// Fixed salt and all-zero output; only the cost fields vary.
const DECOY_SALT: &str = "c2FsdHNhbHRzYWx0c2FsdA";
const DECOY_OUTPUT: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

impl CredentialHasher {
    /// # Errors
    ///
    /// Returns an error if argon2 rejects the cost parameters.
    pub fn new(cost: HashCost) -> Result<Self, ConfigError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| ConfigError::HashParams(e.to_string()))?;
        let decoy = format!(
            "$argon2id$v=19$m={},t={},p={}${DECOY_SALT}${DECOY_OUTPUT}",
            cost.memory_kib, cost.iterations, cost.parallelism
        );
        Ok(Self { params, decoy })
    }

    /// Hash `plaintext` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails or the blocking task is cancelled.
    #[instrument(skip_all)]
    pub async fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let params = self.params.clone();
        let plaintext = plaintext.to_owned();
        task::spawn_blocking(move || hash_blocking(params, &plaintext)).await?
    }

    /// `true` only when `plaintext` produces `digest`. A malformed digest is a
    /// mismatch, never an error.
    #[instrument(skip_all)]
    pub async fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();
        match task::spawn_blocking(move || verify_blocking(&plaintext, &digest)).await {
            Ok(matched) => matched,
            Err(err) => {
                debug!("verify task failed: {err}");
                false
            }
        }
    }

    /// Pay the cost of a verification when there is no stored digest, so an
    /// unknown account takes as long as a wrong password.
    #[instrument(skip_all)]
    pub async fn verify_decoy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, &self.decoy).await;
    }
}

fn hash_blocking(params: Params, plaintext: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::Hash(e.to_string()))
}

fn verify_blocking(plaintext: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        debug!("stored digest is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}
