//! Top-level mapping of request faults to responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::views::View;
use crate::{auth::FlowError, store::StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("resource not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Store(err) => Self::Persistence(err),
            other => Self::Internal(other.into()),
        }
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "The page you are looking for does not exist.",
            Self::Unauthorized => "You are not allowed to do that.",
            Self::Persistence(_) | Self::Internal(_) => "Something went wrong. Please try again.",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Persistence(_) | Self::Internal(_)) {
            error!("Request failed: {self}");
        }
        View::new("pages/error", "Error")
            .with_status(self.status())
            .with_data(json!({ "message": self.message() }))
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_of(err: AppError) -> Option<View> {
        err.into_response().extensions().get::<View>().cloned()
    }

    #[test]
    fn maps_status_codes() {
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Persistence(StoreError::Conflict).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_view_hides_detail() {
        let view = view_of(AppError::Internal(anyhow::anyhow!("db password is hunter2")));
        let Some(view) = view else {
            panic!("error response carries no view");
        };
        assert_eq!(view.name, "pages/error");
        assert_eq!(view.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!view.data.to_string().contains("hunter2"));
    }

    #[test]
    fn flow_store_errors_are_persistence_faults() {
        let err = AppError::from(FlowError::Store(StoreError::Conflict));
        assert!(matches!(err, AppError::Persistence(StoreError::Conflict)));
    }
}
