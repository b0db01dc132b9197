//! Article pages. Everything that changes an article requires a signed-in
//! visitor (see [`SignedIn`]).

use axum::{
    extract::{Extension, Form, Path},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{parse_id, SignedIn};
use crate::{
    api::{error::AppError, views::View},
    store::{ArticleFields, Store},
    validation::{
        checkbox,
        forms::{self, CONTENT, PUBLISHED, TITLE},
        validate, FieldError, Input, Outcome,
    },
};

pub async fn list(Extension(store): Extension<Arc<dyn Store>>) -> Result<Response, AppError> {
    let articles = store.list_articles().await?;
    Ok(View::new("articles/list", "Articles")
        .with_data(json!({ "articles": articles }))
        .into_response())
}

pub async fn details(
    Extension(store): Extension<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: i64 = parse_id(&id)?;
    let article = store.find_article(id).await?.ok_or(AppError::NotFound)?;
    Ok(View::new("articles/details", "Article")
        .with_data(json!({ "article": article }))
        .into_response())
}

pub async fn create_form(SignedIn(_): SignedIn) -> impl IntoResponse {
    View::new("articles/create", "New article")
}

pub async fn create(
    SignedIn(identity): SignedIn,
    Extension(store): Extension<Arc<dyn Store>>,
    Form(input): Form<Input>,
) -> Result<Response, AppError> {
    let fields = match article_fields(store.as_ref(), &input).await? {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(rejected("articles/create", "New article", errors, &input, None));
        }
    };

    let article = store.create_article(fields).await?;
    info!(article_id = article.id, author = %identity.username, "article created");
    Ok(Redirect::to(&format!("/articles/{}", article.id)).into_response())
}

pub async fn update_form(
    SignedIn(_): SignedIn,
    Extension(store): Extension<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: i64 = parse_id(&id)?;
    let article = store.find_article(id).await?.ok_or(AppError::NotFound)?;
    Ok(View::new("articles/update", "Edit article")
        .with_data(json!({ "article": article }))
        .into_response())
}

pub async fn update(
    SignedIn(identity): SignedIn,
    Extension(store): Extension<Arc<dyn Store>>,
    Path(id): Path<String>,
    Form(input): Form<Input>,
) -> Result<Response, AppError> {
    let id: i64 = parse_id(&id)?;
    let fields = match article_fields(store.as_ref(), &input).await? {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(rejected("articles/update", "Edit article", errors, &input, Some(id)));
        }
    };

    let article = store
        .update_article(id, fields)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(article_id = article.id, author = %identity.username, "article updated");
    Ok(Redirect::to(&format!("/articles/{}", article.id)).into_response())
}

pub async fn delete_form(
    SignedIn(_): SignedIn,
    Extension(store): Extension<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: i64 = parse_id(&id)?;
    let article = store.find_article(id).await?.ok_or(AppError::NotFound)?;
    Ok(View::new("articles/delete", "Delete article")
        .with_data(json!({ "article": article }))
        .into_response())
}

pub async fn delete(
    SignedIn(identity): SignedIn,
    Extension(store): Extension<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: i64 = parse_id(&id)?;
    if !store.delete_article(id).await? {
        return Err(AppError::NotFound);
    }
    info!(article_id = id, author = %identity.username, "article deleted");
    Ok(Redirect::to("/articles").into_response())
}

/// Validate an article form. The inner `Err` carries field errors for the
/// form; the outer one is a storage fault.
async fn article_fields(
    store: &dyn Store,
    input: &Input,
) -> Result<Result<ArticleFields, Vec<FieldError>>, AppError> {
    let rules = forms::article().map_err(anyhow::Error::from)?;
    match validate(rules, input, store).await? {
        Outcome::Accepted(mut values) => Ok(Ok(ArticleFields {
            title: values.take(TITLE),
            content: values.take(CONTENT),
            published: checkbox(input.get(PUBLISHED).map(String::as_str)),
        })),
        Outcome::Rejected(errors) => Ok(Err(errors)),
    }
}

fn rejected(
    name: &'static str,
    title: &'static str,
    errors: Vec<FieldError>,
    input: &Input,
    id: Option<i64>,
) -> Response {
    View::new(name, title)
        .with_status(StatusCode::UNPROCESSABLE_ENTITY)
        .with_data(json!({
            "id": id,
            "errors": errors,
            "values": forms::redact(input),
        }))
        .into_response()
}
