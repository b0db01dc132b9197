//! Login: validate, look the account up, verify the password, issue a token.

use tracing::{debug, info, instrument};

use super::{
    state::AuthState,
    token::Identity,
    FlowError,
};
use crate::{
    store::{AccountKey, AccountStore},
    validation::{
        forms::{self, PASSWORD, USERNAME},
        normalize_email, validate, FieldError, Input, Outcome,
    },
};

/// Shown for an unknown account and for a wrong password alike.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password.";

#[derive(Debug)]
pub enum LoginOutcome {
    Rejected {
        errors: Vec<FieldError>,
        input: Input,
    },
    /// Unknown account or wrong password; callers cannot tell which.
    Unauthorized,
    Authenticated {
        identity: Identity,
        token: String,
    },
}

/// Check a login submission and, on success, issue a session token.
///
/// The identifier is looked up as an email when it contains `@`, otherwise as
/// a username.
///
/// # Errors
///
/// Returns an error when the account lookup fails or the token cannot be
/// issued.
#[instrument(skip_all)]
pub async fn login<S>(store: &S, auth: &AuthState, input: &Input) -> Result<LoginOutcome, FlowError>
where
    S: AccountStore + ?Sized,
{
    let values = match validate(forms::login()?, input, store).await? {
        Outcome::Accepted(values) => values,
        Outcome::Rejected(errors) => {
            return Ok(LoginOutcome::Rejected {
                errors,
                input: forms::redact(input),
            });
        }
    };

    let identifier = values.get(USERNAME);
    let account = if identifier.contains('@') {
        store
            .find_account_by(AccountKey::Email, &normalize_email(identifier))
            .await?
    } else {
        store
            .find_account_by(AccountKey::Username, identifier)
            .await?
    };

    let Some(account) = account else {
        auth.hasher().verify_decoy(values.get(PASSWORD)).await;
        debug!("login failed");
        return Ok(LoginOutcome::Unauthorized);
    };

    if !auth
        .hasher()
        .verify(values.get(PASSWORD), &account.password_digest)
        .await
    {
        debug!("login failed");
        return Ok(LoginOutcome::Unauthorized);
    }

    let identity = Identity {
        account_id: account.id,
        username: account.username,
    };
    let token = auth
        .tokens()
        .issue(&identity, auth.config().session_ttl())?;

    info!(account_id = %identity.account_id, "login succeeded");
    Ok(LoginOutcome::Authenticated { identity, token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::state::{AuthConfig, HashCost},
        store::{MemoryStore, NewAccount},
    };
    use anyhow::{bail, Result};
    use secrecy::SecretString;

    fn auth_state() -> Result<AuthState> {
        let config = AuthConfig::new(SecretString::from("y".repeat(40)))?.with_hash_cost(
            HashCost {
                memory_kib: 4096,
                iterations: 1,
                parallelism: 1,
            },
        );
        Ok(AuthState::new(config)?)
    }

    fn credentials(username: &str, password: &str) -> Input {
        [(USERNAME, username), (PASSWORD, password)]
            .into_iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect()
    }

    async fn seeded() -> Result<(MemoryStore, AuthState)> {
        let store = MemoryStore::new();
        let auth = auth_state()?;
        let password_digest = auth.hasher().hash("opensesame").await?;
        store
            .create_account(NewAccount {
                username: "ali".to_string(),
                email: "ali@example.com".to_string(),
                password_digest,
            })
            .await?;
        Ok((store, auth))
    }

    #[tokio::test]
    async fn valid_credentials_issue_a_verifiable_token() -> Result<()> {
        let (store, auth) = seeded().await?;

        let outcome = login(&store, &auth, &credentials(" ali ", "opensesame")).await?;
        let LoginOutcome::Authenticated { identity, token } = outcome else {
            bail!("expected a successful login, got {outcome:?}");
        };
        assert_eq!(identity.username, "ali");
        assert_eq!(auth.tokens().verify(&token)?, identity);
        Ok(())
    }

    #[tokio::test]
    async fn email_identifier_is_accepted() -> Result<()> {
        let (store, auth) = seeded().await?;
        let outcome = login(&store, &auth, &credentials("Ali@Example.com", "opensesame")).await?;
        assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() -> Result<()> {
        let (store, auth) = seeded().await?;

        let unknown = login(&store, &auth, &credentials("nobody", "opensesame")).await?;
        let wrong = login(&store, &auth, &credentials("ali", "closesesame")).await?;

        assert!(matches!(unknown, LoginOutcome::Unauthorized));
        assert!(matches!(wrong, LoginOutcome::Unauthorized));
        Ok(())
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_before_lookup() -> Result<()> {
        let (store, auth) = seeded().await?;
        let outcome = login(&store, &auth, &credentials("", "")).await?;
        let LoginOutcome::Rejected { errors, input } = outcome else {
            bail!("expected a rejection, got {outcome:?}");
        };
        assert_eq!(errors.len(), 2);
        assert!(!input.contains_key(PASSWORD));
        Ok(())
    }
}
