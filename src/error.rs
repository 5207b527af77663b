use std::{any::Any, fmt::Display};

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a handler can surface. Database and Internal carry a
/// client-safe `message` plus a `detail` that is only ever logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{message}: {detail}")]
    Database { message: String, detail: String },

    #[error("{message}: {detail}")]
    Internal { message: String, detail: String },
}

impl AppError {
    pub fn database(message: impl Into<String>, cause: impl Display) -> Self {
        Self::Database {
            message: message.into(),
            detail: format!("{cause:#}"),
        }
    }

    pub fn internal(message: impl Into<String>, cause: impl Display) -> Self {
        Self::Internal {
            message: message.into(),
            detail: format!("{cause:#}"),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthenticated(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database { .. } => "DATABASE_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Conflict shares 400 with the other signup rejections.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> &str {
        match self {
            AppError::Validation(m)
            | AppError::BadRequest(m)
            | AppError::Unauthenticated(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m) => m,
            AppError::Database { message, .. } | AppError::Internal { message, .. } => message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: ErrorInfo<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorInfo<'a> {
    pub code: &'static str,
    pub message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Database { detail, .. } | AppError::Internal { detail, .. } => {
                error!(code = self.code(), %status, detail = %detail, "request failed");
            }
            _ => warn!(code = self.code(), %status, message = self.public_message(), "request rejected"),
        }

        let body = Json(ErrorBody {
            error: ErrorInfo {
                code: self.code(),
                message: self.public_message(),
            },
        });
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "invalid request body");
        AppError::BadRequest("invalid request body".into())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection.body_text(), "invalid query parameters");
        AppError::BadRequest("invalid query parameters".into())
    }
}

/// Renders a handler panic as a generic INTERNAL_ERROR response.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::internal("internal server error", format_args!("panic: {detail}")).into_response()
}
