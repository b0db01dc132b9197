//! Route handlers and the extractors they share.

pub mod articles;
pub mod auth;
pub mod health;
pub mod pages;
pub mod users;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Method},
    response::{IntoResponse, Redirect, Response},
};

use super::error::AppError;
use crate::auth::{CurrentUser, Identity};

/// An authenticated visitor.
///
/// Anonymous page loads are sent to `/login`; anonymous form posts get a
/// 401 error view.
#[derive(Clone, Debug)]
pub struct SignedIn(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SignedIn
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<CurrentUser>()
            .and_then(CurrentUser::identity);
        match identity {
            Some(identity) => Ok(Self(identity.clone())),
            None if parts.method == Method::GET => Err(Redirect::to("/login").into_response()),
            None => Err(AppError::Unauthorized.into_response()),
        }
    }
}

/// Unknown and malformed ids are both "not found".
pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
