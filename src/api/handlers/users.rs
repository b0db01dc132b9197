use axum::{
    extract::{Extension, Path},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::parse_id;
use crate::{
    api::{error::AppError, views::View},
    store::Store,
};

/// Public profile. The password digest never leaves the store layer.
pub async fn profile(
    Extension(store): Extension<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: Uuid = parse_id(&id)?;
    let account = store.find_account(id).await?.ok_or(AppError::NotFound)?;

    Ok(View::new("users/profile", "Profile")
        .with_data(json!({
            "user": {
                "id": account.id,
                "username": account.username,
                "email": account.email,
                "created_at": account.created_at,
            }
        }))
        .into_response())
}
