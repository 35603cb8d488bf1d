//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Every variant maps to one status code and
//! one stable machine code.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    // ------------------------------------------------------------------
    // 400
    // ------------------------------------------------------------------
    /// Malformed input
    #[error("{0}")]
    Validation(String),

    /// Password failed one or more strength rules
    #[error("Password does not meet requirements")]
    WeakPassword(Vec<String>),

    // ------------------------------------------------------------------
    // 401 - who are you
    // ------------------------------------------------------------------
    /// Shared by unknown email, inactive account and wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Current password check failed on a password change
    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Access token required")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    /// Refresh token has no live session behind it
    #[error("Session is invalid or has expired")]
    SessionInvalid,

    // ------------------------------------------------------------------
    // 403 - you can't do that
    // ------------------------------------------------------------------
    #[error("Insufficient permissions")]
    Forbidden,

    // ------------------------------------------------------------------
    // 404 / 409 / 429
    // ------------------------------------------------------------------
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or expired reset token")]
    ResetTokenInvalid,

    #[error("Invalid or expired verification token")]
    VerificationTokenInvalid,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    // ------------------------------------------------------------------
    // 500
    // ------------------------------------------------------------------
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::WeakPassword(_) => ErrorKind::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::IncorrectPassword
            | AuthError::AccountInactive
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::SessionInvalid => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::UserNotFound
            | AuthError::ResetTokenInvalid
            | AuthError::VerificationTokenInvalid => ErrorKind::NotFound,
            AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::RateLimited { .. } => ErrorKind::TooManyRequests,
            AuthError::Database(_)
            | AuthError::Io(_)
            | AuthError::Serialization(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::InvalidCredentials | AuthError::IncorrectPassword => "INVALID_CREDENTIALS",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::MissingToken => "TOKEN_MISSING",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::SessionInvalid => "SESSION_INVALID",
            AuthError::Forbidden => "INSUFFICIENT_PERMISSIONS",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::ResetTokenInvalid => "INVALID_RESET_TOKEN",
            AuthError::VerificationTokenInvalid => "INVALID_VERIFICATION_TOKEN",
            AuthError::EmailTaken => "EMAIL_TAKEN",
            AuthError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::Database(_) => "DATABASE_ERROR",
            AuthError::Io(_) | AuthError::Serialization(_) => "STORAGE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for every "who are you" failure. Authorization failures are not
    /// included.
    pub fn is_authentication_error(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// Convert to AppError. Server-side failures get a generic message.
    pub fn to_app_error(&self) -> AppError {
        let err = if self.kind().is_server_error() {
            AppError::internal("An internal error occurred")
        } else {
            AppError::new(self.kind(), self.to_string())
        };
        let err = err.with_code(self.code());

        match self {
            AuthError::WeakPassword(rules) => err.with_details(rules.clone()),
            AuthError::TokenExpired => err.with_action("Refresh the access token or sign in again"),
            AuthError::SessionInvalid => err.with_action("Please sign in again"),
            AuthError::RateLimited { retry_after_secs } => {
                err.with_action(format!("Try again in {} seconds", retry_after_secs))
            }
            _ => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Io(e) => {
                tracing::error!(error = %e, "Auth storage I/O error");
            }
            AuthError::Serialization(e) => {
                tracing::error!(error = %e, "Auth storage serialization error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials | AuthError::IncorrectPassword => {
                tracing::warn!("Invalid credentials presented");
            }
            AuthError::TokenInvalid | AuthError::SessionInvalid => {
                tracing::warn!(code = self.code(), "Rejected token");
            }
            AuthError::RateLimited { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let retry_after = match &self {
            AuthError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = self.to_app_error().into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
