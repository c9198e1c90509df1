// ── Core error types ──
//
// User-facing errors from resideo-core. Consumers never see raw HTTP
// statuses; the `From<resideo_api::Error>` impl folds transport-layer
// failures into domain variants.

use thiserror::Error;

use crate::model::Characteristic;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("{characteristic} is not supported by {device}")]
    UnsupportedCharacteristic {
        device: String,
        characteristic: Characteristic,
    },

    #[error("{characteristic} is read-only")]
    ReadOnly { characteristic: Characteristic },

    #[error("Invalid value for {characteristic}: {message}")]
    InvalidValue {
        characteristic: Characteristic,
        message: String,
    },

    /// The device has not completed its first pull yet.
    #[error("{device} has not reported its state yet")]
    NotYetAvailable { device: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<resideo_api::Error> for CoreError {
    fn from(err: resideo_api::Error) -> Self {
        let status = err.status();
        match err {
            resideo_api::Error::Unauthorized { message } => {
                CoreError::AuthenticationFailed { message }
            }
            resideo_api::Error::TokenRefresh { message } => CoreError::AuthenticationFailed {
                message: format!("token refresh failed: {message}"),
            },
            resideo_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.origin().ascii_serialization())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status,
                    }
                }
            }
            resideo_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            resideo_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::Api {
                message: other.to_string(),
                status,
            },
        }
    }
}
