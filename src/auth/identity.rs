//! Per-request identity resolution.
//!
//! The [`resolve_identity`] middleware reads the session cookie once, verifies
//! it and stores a [`CurrentUser`] in the request extensions. Missing, invalid
//! or expired tokens all resolve to [`CurrentUser::Anonymous`]; the request is
//! never rejected here.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{InvalidHeaderValue, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::convert::Infallible;
use tracing::debug;

use super::{
    state::AuthConfig,
    token::{Identity, TokenCodec},
};

pub const SESSION_COOKIE_NAME: &str = "quill_session";

/// The visitor behind the current request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "identity", rename_all = "snake_case")]
pub enum CurrentUser {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl CurrentUser {
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(identity) => Some(identity),
        }
    }
}

/// Resolve the session cookie in `headers`.
#[must_use]
pub fn resolve(headers: &HeaderMap, tokens: &TokenCodec) -> CurrentUser {
    let Some(token) = extract_session_token(headers) else {
        return CurrentUser::Anonymous;
    };
    match tokens.verify(&token) {
        Ok(identity) => CurrentUser::Authenticated(identity),
        Err(err) => {
            debug!("Ignoring session cookie: {err}");
            CurrentUser::Anonymous
        }
    }
}

/// Middleware: attach the [`CurrentUser`] to the request before any handler
/// runs.
pub async fn resolve_identity(
    State(tokens): State<TokenCodec>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = resolve(request.headers(), &tokens);
    request.extensions_mut().insert(user);
    next.run(request).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_default())
    }
}

/// `HttpOnly` cookie carrying a freshly issued token.
///
/// # Errors
///
/// Returns an error if the token contains bytes not allowed in a header.
pub fn session_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Expired cookie that makes the browser drop the session.
///
/// # Errors
///
/// Never in practice; the value is built from constants.
pub fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{body::Body, middleware, routing::get, Json, Router};
    use secrecy::SecretString;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "identity-tests-secret-0123456789abcdef";

    fn tokens() -> Result<TokenCodec> {
        Ok(TokenCodec::new(&SecretString::from(SECRET.to_string()))?)
    }

    fn cookie_headers(cookie: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        Ok(headers)
    }

    #[test]
    fn extract_session_token_picks_named_cookie() -> Result<()> {
        let headers = cookie_headers("theme=dark; quill_session=abc.def ; other=1")?;
        assert_eq!(extract_session_token(&headers), Some("abc.def".to_string()));

        let headers = cookie_headers("theme=dark; broken; quill_session=")?;
        assert_eq!(extract_session_token(&headers), None);

        assert_eq!(extract_session_token(&HeaderMap::new()), None);
        Ok(())
    }

    #[test]
    fn resolve_degrades_to_anonymous() -> Result<()> {
        let tokens = tokens()?;
        assert_eq!(resolve(&HeaderMap::new(), &tokens), CurrentUser::Anonymous);

        let headers = cookie_headers("quill_session=garbage")?;
        assert_eq!(resolve(&headers, &tokens), CurrentUser::Anonymous);

        let identity = Identity {
            account_id: Uuid::new_v4(),
            username: "alice".to_string(),
        };
        let expired = tokens.issue_at(&identity, Duration::from_secs(60), 1_000)?;
        let headers = cookie_headers(&format!("quill_session={expired}"))?;
        assert_eq!(resolve(&headers, &tokens), CurrentUser::Anonymous);

        let valid = tokens.issue(&identity, Duration::from_secs(60))?;
        let headers = cookie_headers(&format!("quill_session={valid}"))?;
        assert_eq!(
            resolve(&headers, &tokens),
            CurrentUser::Authenticated(identity)
        );
        Ok(())
    }

    #[test]
    fn session_cookie_attributes() -> Result<()> {
        let config = AuthConfig::new(SecretString::from(SECRET.to_string()))?
            .with_session_ttl_seconds(120);
        let cookie = session_cookie(&config, "tok")?;
        assert_eq!(
            cookie.to_str()?,
            "quill_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=120"
        );

        let secure = config.with_secure_cookies(true);
        let cleared = clear_session_cookie(&secure)?;
        assert_eq!(
            cleared.to_str()?,
            "quill_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure"
        );
        Ok(())
    }

    #[tokio::test]
    async fn middleware_exposes_current_user_to_handlers() -> Result<()> {
        let tokens = tokens()?;
        let app = Router::new()
            .route(
                "/whoami",
                get(|user: CurrentUser| async move { Json(user) }),
            )
            .layer(middleware::from_fn_with_state(
                tokens.clone(),
                resolve_identity,
            ));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/whoami").body(Body::empty())?)
            .await?;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["kind"], "anonymous");

        let identity = Identity {
            account_id: Uuid::new_v4(),
            username: "bob".to_string(),
        };
        let token = tokens.issue(&identity, Duration::from_secs(60))?;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(COOKIE, format!("{SESSION_COOKIE_NAME}={token}"))
                    .body(Body::empty())?,
            )
            .await?;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["kind"], "authenticated");
        assert_eq!(json["identity"]["username"], "bob");
        Ok(())
    }
}
