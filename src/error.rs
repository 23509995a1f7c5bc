use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

use crate::store::StoreError;

/// Typed failure returned by every workflow operation.
#[derive(Debug, PartialEq, Eq, Display)]
pub enum ServiceError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "{}", _0)]
    InvalidState(String),

    #[display(
        fmt = "Insufficient balance: requested {} day(s), {} available",
        requested,
        available
    )]
    InsufficientBalance { requested: i32, available: i32 },

    /// Detail is logged, never returned to the caller.
    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

impl std::error::Error for ServiceError {}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ServiceError::InvalidState(msg.into())
    }

    /// Text safe to hand back to a caller.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "Something went wrong, Contact with system admin".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Datastore operation failed");
        match err {
            StoreError::Duplicate(what) => ServiceError::Conflict(format!("{what} already exists")),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) | ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "message": self.public_message() }))
    }
}
