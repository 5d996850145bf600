//! Error types, the error taxonomy and HTTP response conversion
//!
//! Every error that escapes a handler is classified into one of three
//! [`ErrorClass`]es and rendered as an [`ErrorBody`]:
//!
//! | class | status | `type` |
//! |---|---|---|
//! | [`ErrorClass::InvalidArgument`] | 400 | `Validation Error` |
//! | [`ErrorClass::UnauthorizedAccess`] | 401 | `Authorization Error` |
//! | [`ErrorClass::Other`] | 500 | `Server Error` |
//!
//! Business failures are not errors: they travel as an
//! [`Outcome`](crate::outcome::Outcome) through the response mapper.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::middleware::exception::ErrorReport;
use crate::persistence::StorageError;

/// Message returned to clients for every unclassified failure
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred";

/// Message returned to clients for authorization failures
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized access";

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an unhandled error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The caller supplied an invalid argument
    InvalidArgument,
    /// The caller is not allowed to perform the operation
    UnauthorizedAccess,
    /// Anything else; details are never shown to the client
    Other,
}

impl ErrorClass {
    /// HTTP status code for this class
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::UnauthorizedAccess => StatusCode::UNAUTHORIZED,
            Self::Other => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `type` field in the error body
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "Validation Error",
            Self::UnauthorizedAccess => "Authorization Error",
            Self::Other => "Server Error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::UnauthorizedAccess => write!(f, "unauthorized_access"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(Box<axum::http::Error>),

    /// A caller-supplied argument was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller is not authorized
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested API version is malformed or not served
    #[error("Unsupported API version: {0}")]
    UnsupportedVersion(String),

    /// Persistence failure
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for [`Error::Unauthorized`]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Shorthand for [`Error::Internal`]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidArgument(_) | Error::UnsupportedVersion(_) => {
                ErrorClass::InvalidArgument
            }
            Error::Unauthorized(_) => ErrorClass::UnauthorizedAccess,
            Error::Config(_)
            | Error::Io(_)
            | Error::Http(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Internal(_) => ErrorClass::Other,
        }
    }

    /// Client-facing message; never contains detail for [`ErrorClass::Other`]
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidArgument(msg) => msg.clone(),
            Error::UnsupportedVersion(version) => format!(
                "The requested API version '{}' is not supported",
                version
            ),
            Error::Unauthorized(_) => UNAUTHORIZED_MESSAGE.to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    /// Build the response body for this error
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.class(), self.public_message())
    }
}

/// Error response body
///
/// Serialized with camelCase keys: `{"statusCode": 400, "message": "...", "type": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// HTTP status code
    pub status_code: u16,

    /// Client-facing message
    pub message: String,

    /// Error category label
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ErrorBody {
    /// Create a body for the given class
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            status_code: class.status_code().as_u16(),
            message: message.into(),
            error_type: class.error_type().to_string(),
        }
    }

    /// The body sent for any failure whose detail must stay server-side
    pub fn internal() -> Self {
        Self::new(ErrorClass::Other, INTERNAL_ERROR_MESSAGE)
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let class = self.class();
        let mut response = self.to_body().into_response();

        // The exception boundary logs the full detail and strips this
        response
            .extensions_mut()
            .insert(ErrorReport::new(class, self.to_string()));

        response
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<axum::http::Error> for Error {
    fn from(err: axum::http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::StorageOperation;

    #[test]
    fn test_invalid_argument_is_validation_error() {
        let error = Error::invalid_argument("name must not be empty");
        let body = error.to_body();

        assert_eq!(error.class(), ErrorClass::InvalidArgument);
        assert_eq!(body.status_code, 400);
        assert_eq!(body.error_type, "Validation Error");
        assert_eq!(body.message, "name must not be empty");
    }

    #[test]
    fn test_unauthorized_is_authorization_error() {
        let body = Error::unauthorized("token expired for user 42").to_body();

        assert_eq!(body.status_code, 401);
        assert_eq!(body.error_type, "Authorization Error");
        assert_eq!(body.message, UNAUTHORIZED_MESSAGE);
    }

    #[test]
    fn test_other_errors_never_leak_detail() {
        let errors = vec![
            Error::internal("connection string postgres://sa:secret@db"),
            Error::Io(std::io::Error::other("disk on fire")),
            Error::Storage(StorageError::database_error(
                StorageOperation::Save,
                "relation \"stations\" does not exist",
            )),
        ];

        for error in errors {
            let original = error.to_string();
            let body = error.to_body();
            assert_eq!(body.status_code, 500);
            assert_eq!(body.error_type, "Server Error");
            assert_eq!(body.message, INTERNAL_ERROR_MESSAGE);
            assert_ne!(body.message, original);
        }
    }

    #[test]
    fn test_unsupported_version_is_argument_error() {
        let error = Error::UnsupportedVersion("7".to_string());
        assert_eq!(error.class(), ErrorClass::InvalidArgument);
        assert!(error.public_message().contains("'7'"));
    }

    #[test]
    fn test_error_body_uses_camel_case() {
        let body = ErrorBody::new(ErrorClass::InvalidArgument, "bad");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["message"], "bad");
        assert_eq!(json["type"], "Validation Error");
        assert!(json.get("status_code").is_none());
    }

    #[test]
    fn test_into_response_attaches_report() {
        let response = Error::internal("boom").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.class(), ErrorClass::Other);
        assert!(report.detail().contains("boom"));
    }

    #[test]
    fn test_error_class_display() {
        assert_eq!(ErrorClass::InvalidArgument.to_string(), "invalid_argument");
        assert_eq!(ErrorClass::UnauthorizedAccess.to_string(), "unauthorized_access");
        assert_eq!(ErrorClass::Other.to_string(), "other");
    }
}
