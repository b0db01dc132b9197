use axum::response::IntoResponse;

use crate::api::views::View;

pub async fn home() -> impl IntoResponse {
    View::new("pages/home", "Home")
}

pub async fn about() -> impl IntoResponse {
    View::new("pages/about", "About")
}
