//! Signed, time-bound session tokens.
//!
//! Wire format: `base64url(claims_json) "." base64url(hmac_sha256(first_part))`,
//! both parts unpadded. The claims carry the account id, the username and the
//! issue/expiry timestamps in Unix seconds.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use super::state::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Who a valid token speaks for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub account_id: Uuid,
    pub username: String,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, tampered with, or signed with another secret.
    #[error("invalid session token")]
    Invalid,
    #[error("session token expired")]
    Expired,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    name: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies session tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
}

impl TokenCodec {
    /// # Errors
    ///
    /// Returns an error if the secret is empty.
    pub fn new(secret: &SecretString) -> Result<Self, ConfigError> {
        let key = secret.expose_secret().as_bytes();
        if key.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| ConfigError::MissingSecret)?;
        Ok(Self { mac })
    }

    /// Issue a token for `identity` that expires `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, serde_json::Error> {
        self.issue_at(identity, ttl, unix_now())
    }

    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl: Duration,
        now: i64,
    ) -> Result<String, serde_json::Error> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: identity.account_id,
            name: identity.username.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };
        let payload = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&claims)?);
        let signature = self.sign(&payload);
        Ok(format!("{payload}.{signature}"))
    }

    /// Check the signature first, then expiry.
    ///
    /// # Errors
    ///
    /// [`TokenError::Invalid`] for anything malformed or wrongly signed,
    /// [`TokenError::Expired`] once `exp` has been reached.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// # Errors
    ///
    /// Same as [`TokenCodec::verify`], evaluated at `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Identity, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;
        if payload.is_empty() || signature.contains('.') {
            return Err(TokenError::Invalid);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature).map_err(|_| TokenError::Invalid)?;
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::Invalid)?;

        let json = Base64UrlUnpadded::decode_vec(payload).map_err(|_| TokenError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Invalid)?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(Identity {
            account_id: claims.sub,
            username: claims.name,
        })
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("key", &"***").finish()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}
