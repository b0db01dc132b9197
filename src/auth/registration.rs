//! Signup: validate, hash, persist.

use tracing::{debug, error, info, instrument, warn};

use super::{state::AuthState, FlowError};
use crate::{
    store::{Account, AccountStore, NewAccount, StoreError},
    validation::{
        forms::{self, EMAIL, PASSWORD, USERNAME},
        validate, FieldError, Input, Outcome,
    },
};

#[derive(Debug)]
pub enum RegistrationOutcome {
    /// Field errors plus the submitted values (passwords removed) to re-render
    /// the form with.
    Rejected {
        errors: Vec<FieldError>,
        input: Input,
    },
    /// Validation passed but the store refused the write; the visitor only
    /// sees a generic failure.
    PersistFailed,
    Created(Account),
}

/// Run a signup submission through validation, hashing and persistence.
///
/// The plaintext password is never stored or logged; only its digest reaches
/// the store.
///
/// # Errors
///
/// Returns an error when the uniqueness lookup fails or hashing fails. A
/// refused insert is not an error, see [`RegistrationOutcome::PersistFailed`].
#[instrument(skip_all)]
pub async fn register<S>(
    store: &S,
    auth: &AuthState,
    input: &Input,
) -> Result<RegistrationOutcome, FlowError>
where
    S: AccountStore + ?Sized,
{
    let mut values = match validate(forms::signup()?, input, store).await? {
        Outcome::Accepted(values) => values,
        Outcome::Rejected(errors) => {
            debug!("signup rejected with {} field error(s)", errors.len());
            return Ok(RegistrationOutcome::Rejected {
                errors,
                input: forms::redact(input),
            });
        }
    };

    let password_digest = auth.hasher().hash(values.get(PASSWORD)).await?;

    let account = NewAccount {
        username: values.take(USERNAME),
        email: values.take(EMAIL),
        password_digest,
    };

    match store.create_account(account).await {
        Ok(account) => {
            info!(account_id = %account.id, "account created");
            Ok(RegistrationOutcome::Created(account))
        }
        Err(StoreError::Conflict) => {
            warn!("account insert hit a unique constraint");
            Ok(RegistrationOutcome::PersistFailed)
        }
        Err(err) => {
            error!("Failed to create account: {err}");
            Ok(RegistrationOutcome::PersistFailed)
        }
    }
}
