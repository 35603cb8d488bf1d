//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum that maps to HTTP status codes and to the
//! default machine-readable code clients switch on.

use serde::Serialize;

/// Error classification.
///
/// Each variant maps to exactly one HTTP status code and one default
/// machine-readable code. Crates narrow the code further with
/// [`AppError::with_code`](super::app_error::AppError::with_code).
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::NotFound;
/// assert_eq!(kind.status_code(), 404);
/// assert_eq!(kind.default_code(), "NOT_FOUND");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - malformed input, failed validation
    BadRequest,
    /// 401 - who are you
    Unauthorized,
    /// 403 - you can't do that
    Forbidden,
    /// 404
    NotFound,
    /// 409 - conflicts with current state (duplicate key)
    Conflict,
    /// 429
    TooManyRequests,
    /// 500
    InternalServerError,
    /// 503
    ServiceUnavailable,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Standard reason phrase.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::TooManyRequests => "Too Many Requests",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Machine-readable code used when the error carries no narrower one.
    #[inline]
    pub const fn default_code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "AUTHENTICATION_ERROR",
            ErrorKind::Forbidden => "AUTHORIZATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::TooManyRequests => "RATE_LIMIT_EXCEEDED",
            ErrorKind::InternalServerError => "INTERNAL_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// 5xx. These are the ones worth an `error!` log line.
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// 4xx.
    #[inline]
    pub const fn is_client_error(&self) -> bool {
        let code = self.status_code();
        code >= 400 && code < 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorKind; 8] = [
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::TooManyRequests,
        ErrorKind::InternalServerError,
        ErrorKind::ServiceUnavailable,
    ];

    #[test]
    fn test_status_codes() {
        let expected = [400, 401, 403, 404, 409, 429, 500, 503];
        for (kind, status) in ALL.iter().zip(expected) {
            assert_eq!(kind.status_code(), status, "status for {:?}", kind);
        }
    }

    #[test]
    fn test_authn_and_authz_codes_differ() {
        assert_ne!(
            ErrorKind::Unauthorized.default_code(),
            ErrorKind::Forbidden.default_code()
        );
    }

    #[test]
    fn test_server_client_partition() {
        for kind in ALL {
            assert_ne!(kind.is_server_error(), kind.is_client_error());
        }
        assert!(ErrorKind::InternalServerError.is_server_error());
        assert!(ErrorKind::TooManyRequests.is_client_error());
    }
}
