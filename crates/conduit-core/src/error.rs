//! Error types for the Conduit service core

use crate::response::{Body, ResponseBuilder};
use http::{Method, Response, StatusCode};
use serde::Serialize;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Wire-level classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input (4xx)
    Validation,
    /// Authentication or authorization failure (4xx)
    Forbidden,
    /// No route or no record for the requested key (4xx)
    NotFound,
    /// Storage, encoding or unclassified failure (5xx)
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable lowercase name, used in log fields
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Main error type for the service core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input supplied by the caller
    #[error("{0}")]
    Validation(String),

    /// Caller is not allowed to perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// Requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// No registered route accepted the request
    #[error("route not found: {method} {path}")]
    RouteNotFound {
        /// Request method
        method: Method,
        /// Request path
        path: String,
    },

    /// Request body could not be decoded into the declared payload type
    #[error("invalid request body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Response payload could not be encoded
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    /// Route pattern rejected at registration time
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// Backing store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Handler or middleware panicked while serving a request
    #[error("handler panicked: {0}")]
    Panic(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP construction error
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body written for error responses
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Error::Forbidden(message.into())
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Decode(_) => ErrorKind::Validation,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::NotFound(_) | Error::RouteNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Render the error as a wire response: `{"message": "..."}` plus the kind's status
    pub fn to_response(&self) -> Response<Body> {
        let message = self.to_string();
        ResponseBuilder::new(self.to_status_code())
            .json_body(&ErrorBody { message: &message })
            .unwrap_or_else(|_| {
                let mut response = Response::new(Body::default());
                *response.status_mut() = self.to_status_code();
                response
            })
    }
}
