//! Signup, login and logout.

use axum::{
    extract::{Extension, Form},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::{
    api::{error::AppError, views::View},
    auth::{
        self,
        identity::{clear_session_cookie, session_cookie},
        AuthState, LoginOutcome, RegistrationOutcome, INVALID_CREDENTIALS,
    },
    store::Store,
    validation::{forms, Input},
};

const REGISTRATION_FAILED: &str = "We could not create your account. Please try again.";

pub async fn signup_form() -> impl IntoResponse {
    View::new("auth/signup", "Sign up")
}

pub async fn signup(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    Form(input): Form<Input>,
) -> Result<Response, AppError> {
    let outcome = auth::register(store.as_ref(), &auth_state, &input).await?;
    let response = match outcome {
        RegistrationOutcome::Created(account) => {
            Redirect::to(&format!("/users/{}", account.id)).into_response()
        }
        RegistrationOutcome::Rejected { errors, input } => View::new("auth/signup", "Sign up")
            .with_status(StatusCode::UNPROCESSABLE_ENTITY)
            .with_data(json!({ "errors": errors, "values": input }))
            .into_response(),
        RegistrationOutcome::PersistFailed => View::new("auth/signup", "Sign up")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_data(json!({
                "message": REGISTRATION_FAILED,
                "values": forms::redact(&input),
            }))
            .into_response(),
    };
    Ok(response)
}

pub async fn login_form() -> impl IntoResponse {
    View::new("auth/login", "Log in")
}

pub async fn login(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    Form(input): Form<Input>,
) -> Result<Response, AppError> {
    let outcome = auth::login(store.as_ref(), &auth_state, &input).await?;
    let response = match outcome {
        LoginOutcome::Authenticated { token, .. } => {
            let cookie = session_cookie(auth_state.config(), &token)
                .map_err(|err| AppError::Internal(err.into()))?;
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            (headers, Redirect::to("/articles")).into_response()
        }
        LoginOutcome::Rejected { errors, input } => View::new("auth/login", "Log in")
            .with_status(StatusCode::UNPROCESSABLE_ENTITY)
            .with_data(json!({ "errors": errors, "values": input }))
            .into_response(),
        LoginOutcome::Unauthorized => View::new("auth/login", "Log in")
            .with_status(StatusCode::UNAUTHORIZED)
            .with_data(json!({
                "message": INVALID_CREDENTIALS,
                "values": forms::redact(&input),
            }))
            .into_response(),
    };
    Ok(response)
}

/// Always clears the cookie, whether or not a session was present.
pub async fn logout(Extension(auth_state): Extension<Arc<AuthState>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    match clear_session_cookie(auth_state.config()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build logout cookie: {err}"),
    }
    (headers, Redirect::to("/"))
}
