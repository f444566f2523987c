use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use carriertrust_core::lifecycle::InvalidTransition;
use carriertrust_core::SubmissionError;

use crate::identity::IdentityError;
use crate::store::StoreError;

pub const STORE_FAILURE_MESSAGE: &str = "The record store could not complete the request.";
pub const IDENTITY_FAILURE_MESSAGE: &str = "Could not verify your session.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Please log in to continue.")]
    Unauthenticated,

    #[error("Access denied.")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            AppError::Store(_) | AppError::Identity(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show the caller. Backend failure text stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Store(StoreError::NotFound { entity }) => {
                format!("{} not found", capitalize(entity))
            }
            AppError::Store(StoreError::PermissionDenied(_)) => AppError::Forbidden.to_string(),
            AppError::Store(_) => STORE_FAILURE_MESSAGE.to_string(),
            AppError::Identity(_) => IDENTITY_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::BAD_GATEWAY {
            error!("Backend failure: {}", self);
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
