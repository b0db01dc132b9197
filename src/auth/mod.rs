//! Credentials, session tokens and the signup/login flows.

pub mod hasher;
pub mod identity;
pub mod login;
pub mod registration;
pub mod state;
pub mod token;

pub use hasher::{CredentialHasher, HashError};
pub use identity::{CurrentUser, SESSION_COOKIE_NAME};
pub use login::{login, LoginOutcome, INVALID_CREDENTIALS};
pub use registration::{register, RegistrationOutcome};
pub use state::{AuthConfig, AuthState, ConfigError, HashCost};
pub use token::{Identity, TokenCodec, TokenError};

use thiserror::Error;

use crate::store::StoreError;

/// Faults that stop a flow before it can produce an outcome.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error("failed to issue session token: {0}")]
    Token(#[from] serde_json::Error),
    #[error("form rules failed to compile: {0}")]
    Rules(#[from] regex::Error),
}
