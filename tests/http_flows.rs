use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use quill::{
    api::{self, views::JsonRenderer, AppState},
    auth::{AuthConfig, AuthState, HashCost},
    store::MemoryStore,
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Result<Router> {
    let config = AuthConfig::new(SecretString::from(
        "integration-secret-0123456789abcdef".to_string(),
    ))?
    .with_hash_cost(HashCost {
        memory_kib: 4096,
        iterations: 1,
        parallelism: 1,
    });

    Ok(api::router(AppState {
        store: Arc::new(MemoryStore::new()),
        auth: Arc::new(AuthState::new(config)?),
        renderer: Arc::new(JsonRenderer),
    }))
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Result<Response> {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    Ok(app.clone().oneshot(request.body(Body::empty())?).await?)
}

async fn post(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Result<Response> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    Ok(app
        .clone()
        .oneshot(request.body(Body::from(form.to_string()))?)
        .await?)
}

async fn json(response: Response) -> Result<Value> {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn location(response: &Response) -> Result<String> {
    Ok(response
        .headers()
        .get(LOCATION)
        .context("missing Location header")?
        .to_str()?
        .to_string())
}

/// `name=value` part of the Set-Cookie header, ready for a Cookie header.
fn session_pair(response: &Response) -> Result<String> {
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie header")?
        .to_str()?;
    Ok(set_cookie
        .split(';')
        .next()
        .context("empty Set-Cookie header")?
        .to_string())
}

#[tokio::test]
async fn signup_login_write_logout() -> Result<()> {
    let app = app()?;

    // Sign up and land on the profile.
    let response = post(
        &app,
        "/signup",
        "username=alice&email=Alice%40Example.com&password=wonderland&passwordConfirmation=wonderland",
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let profile = location(&response)?;
    assert!(profile.starts_with("/users/"));

    let response = get(&app, &profile, None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let view = json(response).await?;
    assert_eq!(view["name"], "users/profile");
    assert_eq!(view["data"]["user"]["username"], "alice");
    assert_eq!(view["data"]["user"]["email"], "alice@example.com");
    assert!(!view.to_string().contains("argon2"));

    // Wrong password and unknown user read the same.
    let wrong = json(post(&app, "/login", "username=alice&password=nope", None).await?).await?;
    let unknown = json(post(&app, "/login", "username=bob&password=nope", None).await?).await?;
    assert_eq!(wrong["data"]["message"], "Invalid username or password.");
    assert_eq!(wrong["data"], unknown["data"]);

    // Log in.
    let response = post(&app, "/login", "username=alice&password=wonderland", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/articles");
    let cookie = session_pair(&response)?;
    assert!(cookie.starts_with("quill_session="));

    // Anonymous visitors cannot reach the editor.
    let response = get(&app, "/articles/create", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/login");

    let response = post(&app, "/articles/create", "title=Hi&content=There", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Rejected article keeps the input.
    let response = post(
        &app,
        "/articles/create",
        "title=&content=ab",
        Some(&cookie),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let view = json(response).await?;
    assert_eq!(view["name"], "articles/create");
    assert_eq!(view["data"]["errors"][0]["field"], "title");
    assert_eq!(view["data"]["errors"][1]["field"], "content");
    assert_eq!(view["data"]["values"]["content"], "ab");

    // Create, read back, unpublish.
    let response = post(
        &app,
        "/articles/create",
        "title=Hello%2C+world%21&content=%3Cb%3Ebold%3C%2Fb%3E",
        Some(&cookie),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let article = location(&response)?;

    let view = json(get(&app, &article, Some(&cookie)).await?).await?;
    assert_eq!(view["data"]["article"]["title"], "Hello, world!");
    assert_eq!(
        view["data"]["article"]["content"],
        "&lt;b&gt;bold&lt;&#x2F;b&gt;"
    );
    assert_eq!(view["data"]["article"]["published"], true);
    assert_eq!(view["user"]["kind"], "authenticated");
    assert_eq!(view["user"]["identity"]["username"], "alice");

    let response = post(
        &app,
        &format!("{article}/update"),
        "title=Hello+again&content=Updated+body&published=off",
        Some(&cookie),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let view = json(get(&app, &article, None).await?).await?;
    assert_eq!(view["data"]["article"]["title"], "Hello again");
    assert_eq!(view["data"]["article"]["published"], false);
    assert_eq!(view["user"]["kind"], "anonymous");

    // Delete.
    let response = post(&app, &format!("{article}/delete"), "", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/articles");
    assert_eq!(
        get(&app, &article, None).await?.status(),
        StatusCode::NOT_FOUND
    );

    // Log out.
    let response = get(&app, "/logout", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .context("logout must clear the cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn signup_rejection_echoes_input_without_passwords() -> Result<()> {
    let app = app()?;

    let response = post(
        &app,
        "/signup",
        "username=&email=bad&password=123&passwordConfirmation=124",
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let view = json(response).await?;
    assert_eq!(view["name"], "auth/signup");
    let errors = view["data"]["errors"]
        .as_array()
        .context("errors must be a list")?;
    assert_eq!(errors.len(), 4);
    assert_eq!(view["data"]["values"]["email"], "bad");
    assert!(view["data"]["values"].get("password").is_none());
    assert!(view["data"]["values"].get("passwordConfirmation").is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_ids_are_not_found() -> Result<()> {
    let app = app()?;

    for uri in ["/nope", "/articles/999", "/articles/abc", "/users/not-a-uuid"] {
        let response = get(&app, uri, None).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert!(response.headers().contains_key("x-request-id"));
        let view = json(response).await?;
        assert_eq!(view["name"], "pages/error");
    }
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_is_anonymous() -> Result<()> {
    let app = app()?;

    let view = json(get(&app, "/", Some("quill_session=forged.token")).await?).await?;
    assert_eq!(view["name"], "pages/home");
    assert_eq!(view["user"]["kind"], "anonymous");
    Ok(())
}
