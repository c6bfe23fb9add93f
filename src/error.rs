//! Typed errors and HTTP mapping.

use crate::payment::PaymentError;
use crate::store::StoreError;
use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message sent to clients for every 5xx; the real cause only goes to the log.
pub const INTERNAL_MESSAGE: &str = "Something went very wrong!";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate resource name: {0}")]
    DuplicateName(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("This page does not exist")]
    PageNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Request body is too large")]
    PayloadTooLarge,
    #[error("Too many requests from this IP, please try again in an hour!")]
    TooManyRequests,
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) | AppError::PageNotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn doc_not_found() -> Self {
        AppError::NotFound("No document found with that ID".into())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Constraint(msg) => AppError::Validation(msg),
            StoreError::Duplicate(msg) => AppError::Conflict(format!("Duplicate field value: {}", msg)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            return AppError::Internal(rejection.body_text());
        }
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        AppError::Internal(e.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn internal() -> Self {
        ErrorBody {
            status: "error",
            message: INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            ErrorBody::internal()
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
            ErrorBody {
                status: "fail",
                message: self.to_string(),
            }
        };
        (status, Json(body)).into_response()
    }
}
