use reqwest::StatusCode;
use thiserror::Error;

/// Top-level error type for the `resideo-api` crate.
///
/// Every non-2xx response maps to exactly one status variant so callers can
/// log and classify it without inspecting raw status codes. `resideo-core`
/// decides what to do with each class (retry, back off, refresh the token).
#[derive(Debug, Error)]
pub enum Error {
    // ── HTTP status classes ─────────────────────────────────────────
    /// 400: the request body was rejected (usually a field the model does not accept).
    #[error("Bad Request: {message}")]
    BadRequest { message: String },

    /// 401: the bearer token is missing, expired or revoked.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not Found: {message}")]
    NotFound { message: String },

    #[error("Not Acceptable: {message}")]
    NotAcceptable { message: String },

    #[error("Unsupported Media Type: {message}")]
    UnsupportedMediaType { message: String },

    #[error("Unprocessable Entity: {message}")]
    UnprocessableEntity { message: String },

    /// 429. `retry_after_secs` is taken from the `Retry-After` header when present.
    #[error("Too Many Requests{}", .retry_after_secs.map(|s| format!(" -- retry after {s}s")).unwrap_or_default())]
    TooManyRequests { retry_after_secs: Option<u64> },

    #[error("Internal Server Error: {message}")]
    InternalServerError { message: String },

    /// Any status outside the documented set.
    #[error("Unknown status {status}: {message}")]
    UnknownStatus { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection-level failure (timeout, DNS, reset).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Credentials ─────────────────────────────────────────────────
    /// The token source could not produce a fresh access token.
    #[error("Access token refresh failed: {message}")]
    TokenRefresh { message: String },
}

/// How the reconciliation engine should react to a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Refresh the access token and retry once, outside the backoff budget.
    Auth,
    /// Back off longer than for any ordinary failure.
    RateLimited,
    /// Standard exponential backoff.
    Retryable,
    /// Give up on this attempt.
    Fatal,
}

impl Error {
    /// Map a non-success status and the vendor's message into an error variant.
    pub fn from_status(status: StatusCode, message: String, retry_after_secs: Option<u64>) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest { message },
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            406 => Self::NotAcceptable { message },
            415 => Self::UnsupportedMediaType { message },
            422 => Self::UnprocessableEntity { message },
            429 => Self::TooManyRequests { retry_after_secs },
            500 => Self::InternalServerError { message },
            other => Self::UnknownStatus {
                status: other,
                message,
            },
        }
    }

    /// HTTP status code behind this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { .. } => Some(400),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::NotAcceptable { .. } => Some(406),
            Self::UnsupportedMediaType { .. } => Some(415),
            Self::UnprocessableEntity { .. } => Some(422),
            Self::TooManyRequests { .. } => Some(429),
            Self::InternalServerError { .. } => Some(500),
            Self::UnknownStatus { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify the error for retry purposes.
    ///
    /// Transport failures back off the same way a 500 does. Unknown statuses,
    /// malformed bodies and local failures are not retried.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthorized { .. } => ErrorClass::Auth,
            Self::TooManyRequests { .. } => ErrorClass::RateLimited,
            Self::BadRequest { .. }
            | Self::Forbidden { .. }
            | Self::NotFound { .. }
            | Self::NotAcceptable { .. }
            | Self::UnsupportedMediaType { .. }
            | Self::UnprocessableEntity { .. }
            | Self::InternalServerError { .. }
            | Self::Transport(_) => ErrorClass::Retryable,
            Self::UnknownStatus { .. }
            | Self::InvalidUrl(_)
            | Self::Deserialization { .. }
            | Self::TokenRefresh { .. } => ErrorClass::Fatal,
        }
    }

    /// Returns `true` if the bearer token was rejected.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `Retry-After` hint from a 429 response.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::TooManyRequests { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_status_has_its_own_variant() {
        let codes = [400, 401, 403, 404, 406, 415, 422, 429, 500];
        for code in codes {
            let status = StatusCode::from_u16(code).unwrap();
            let err = Error::from_status(status, "boom".into(), None);
            assert_eq!(err.status(), Some(code));
            assert!(
                !matches!(err, Error::UnknownStatus { .. }),
                "{code} fell through to UnknownStatus"
            );
        }
    }

    #[test]
    fn unknown_status_is_fatal() {
        let err = Error::from_status(StatusCode::IM_A_TEAPOT, String::new(), None);
        assert!(matches!(err, Error::UnknownStatus { status: 418, .. }));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn classification() {
        let unauthorized = Error::from_status(StatusCode::UNAUTHORIZED, String::new(), None);
        let limited = Error::from_status(StatusCode::TOO_MANY_REQUESTS, String::new(), Some(7));
        let server = Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, String::new(), None);

        assert_eq!(unauthorized.class(), ErrorClass::Auth);
        assert!(unauthorized.is_auth_expired());
        assert_eq!(limited.class(), ErrorClass::RateLimited);
        assert_eq!(limited.retry_after_secs(), Some(7));
        assert_eq!(server.class(), ErrorClass::Retryable);
    }

    #[test]
    fn rate_limit_message_mentions_retry_after() {
        let err = Error::TooManyRequests {
            retry_after_secs: Some(12),
        };
        assert_eq!(err.to_string(), "Too Many Requests -- retry after 12s");
        let err = Error::TooManyRequests {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Too Many Requests");
    }
}
