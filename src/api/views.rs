//! The rendering seam.
//!
//! Handlers return a [`View`] (view name plus data bag) and never format a
//! body themselves. The view travels in the response extensions until the
//! [`render_views`] middleware hands it to the configured [`Render`]
//! implementation, together with the identity resolved for the request.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::CurrentUser;

#[derive(Clone, Debug, Serialize)]
pub struct View {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(skip)]
    pub status: StatusCode,
    pub data: Value,
    pub user: CurrentUser,
}

impl View {
    #[must_use]
    pub fn new(name: &'static str, title: &'static str) -> Self {
        Self {
            name,
            title,
            status: StatusCode::OK,
            data: Value::Object(Map::new()),
            user: CurrentUser::Anonymous,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.user = user;
        self
    }
}

impl IntoResponse for View {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Turns a [`View`] into a response body.
pub trait Render: Send + Sync {
    fn render(&self, view: View) -> Response;
}

/// Renders the view as a JSON document. Stand-in for an HTML template engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Render for JsonRenderer {
    fn render(&self, view: View) -> Response {
        let status = view.status;
        (status, Json(view)).into_response()
    }
}

/// Middleware: render any [`View`] left in the response by a handler.
pub async fn render_views(
    State(renderer): State<Arc<dyn Render>>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .unwrap_or_default();

    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<View>() {
        Some(view) => {
            let (parts, _) = response.into_parts();
            let mut rendered = renderer.render(view.with_user(user));
            for (name, value) in &parts.headers {
                rendered.headers_mut().append(name, value.clone());
            }
            rendered
        }
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[tokio::test]
    async fn json_renderer_keeps_status_and_data() -> Result<()> {
        let view = View::new("articles/list", "Articles")
            .with_status(StatusCode::UNPROCESSABLE_ENTITY)
            .with_data(json!({ "articles": [] }));

        let response = JsonRenderer.render(view);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json: Value = serde_json::from_slice(&body)?;
        assert_eq!(json["name"], "articles/list");
        assert_eq!(json["title"], "Articles");
        assert_eq!(json["data"]["articles"], json!([]));
        assert_eq!(json["user"]["kind"], "anonymous");
        assert!(json.get("status").is_none());
        Ok(())
    }

    #[test]
    fn view_response_defers_rendering() {
        let response = View::new("pages/home", "Home").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<View>().is_some());
    }
}
