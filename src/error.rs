/// Unified Error Handling Module
///
/// Authentication failures and infrastructure failures are kept as
/// distinct kinds internally (for logging and alerting) and collapsed to
/// generic messages at the HTTP boundary: a caller must never learn
/// whether a denied refresh was forged, expired, or replayed, and must
/// never mistake a storage outage for bad credentials.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Authentication and session-token errors.
///
/// All of these are terminal: the caller restarts the relevant flow
/// (re-login) rather than retrying the same call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No identity matches the claimed username or email.
    NotFound,
    /// Identity exists but the credential or token is not valid for it.
    Unauthorized,
    /// Token signature does not verify: forged or corrupt.
    InvalidSignature,
    /// Token signature verifies but the token has lapsed.
    Expired,
    /// Token signature verifies but it no longer matches the stored
    /// value: already rotated out, or never issued to this identity.
    TokenReused,
    /// No refresh token was presented at all.
    MissingToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotFound => write!(f, "no matching identity"),
            AuthError::Unauthorized => write!(f, "invalid credentials"),
            AuthError::InvalidSignature => write!(f, "token signature verification failed"),
            AuthError::Expired => write!(f, "token has expired"),
            AuthError::TokenReused => write!(f, "token does not match the stored session"),
            AuthError::MissingToken => write!(f, "missing token"),
        }
    }
}

impl StdError for AuthError {}

/// Persistence-layer errors. Never conflated with authentication
/// failures.
#[derive(Debug)]
pub enum StoreError {
    ConnectionPool(String),
    QueryExecution(String),
    UnexpectedError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionPool(msg) => write!(f, "store connection error: {}", msg),
            StoreError::QueryExecution(msg) => write!(f, "store query error: {}", msg),
            StoreError::UnexpectedError(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

/// Central error type that all application errors map to.
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Store(StoreError),
    Validation(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Validation(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("pool") || error_msg.contains("connect") {
            AppError::Store(StoreError::ConnectionPool(error_msg))
        } else {
            AppError::Store(StoreError::QueryExecution(error_msg))
        }
    }
}

/// Error response body for HTTP responses.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    /// Maps the internal error kind to its wire representation.
    ///
    /// InvalidSignature, Expired and TokenReused all collapse to the same
    /// generic "refresh denied" body; the distinction only survives in
    /// the logs.
    fn wire_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(e) => match e {
                AuthError::NotFound => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "User does not exist".to_string(),
                ),
                AuthError::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid credentials".to_string(),
                ),
                AuthError::InvalidSignature | AuthError::Expired | AuthError::TokenReused => (
                    StatusCode::UNAUTHORIZED,
                    "REFRESH_DENIED",
                    "Invalid refresh token".to_string(),
                ),
                AuthError::MissingToken => (
                    StatusCode::UNAUTHORIZED,
                    "MISSING_TOKEN",
                    "Missing authentication token".to_string(),
                ),
            },
            AppError::Store(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Auth(e) => {
                tracing::warn!(
                    request_id = request_id,
                    kind = ?e,
                    "Authentication failure"
                );
            }
            AppError::Store(e) => {
                tracing::error!(
                    request_id = request_id,
                    error = %e,
                    "Store failure"
                );
            }
            AppError::Validation(msg) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %msg,
                    "Validation failure"
                );
            }
            AppError::Internal(msg) => {
                tracing::error!(
                    request_id = request_id,
                    error = %msg,
                    "Internal error"
                );
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, code, message) = self.wire_parts();
        let body = ErrorResponse::new(request_id, message, code.to_string(), status.as_u16());

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.wire_parts().0
    }
}
