//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use resideo_config::ConfigError;
use resideo_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PUSH_FAILED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Resideo API at {url}")]
    #[diagnostic(
        code(resideo::connection_failed),
        help(
            "Check your network connection, or the base_url in your config.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(resideo::auth_failed),
        help(
            "The access token was rejected. Log in again with your OAuth helper,\n\
             then store the new token with: resideo config set-secret access-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No {secret} configured")]
    #[diagnostic(
        code(resideo::no_credentials),
        help(
            "Set {env}, store it with: resideo config set-secret {arg},\n\
             or add it to the [credentials] section of {path}"
        )
    )]
    NoCredentials {
        secret: String,
        env: String,
        arg: String,
        path: String,
    },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(resideo::not_found),
        help("Run: resideo devices --all to see every device on the account")
    )]
    DeviceNotFound { identifier: String },

    #[error("'{identifier}' matches more than one device: {matches}")]
    #[diagnostic(code(resideo::ambiguous), help("Use the device ID instead of the name."))]
    AmbiguousDevice { identifier: String, matches: String },

    #[error("Push to {device} was abandoned: {message}")]
    #[diagnostic(
        code(resideo::push_failed),
        help("The device keeps its previous value. Run with -v for the retry log.")
    )]
    PushFailed { device: String, message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(resideo::api_error))]
    Api { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(resideo::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(resideo::config),
        help("Check the config file, or run: resideo config path")
    )]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out waiting for {what}")]
    #[diagnostic(
        code(resideo::timeout),
        help("Increase the timeout (--timeout, or --wait for set) or retry later.")
    )]
    Timeout { what: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(resideo::serialization))]
    Serialization(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::PushFailed { .. } => exit_code::PUSH_FAILED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::AmbiguousDevice { .. } | Self::Config(_) => {
                exit_code::USAGE
            }
            Self::Api { .. } | Self::Io(_) | Self::Serialization(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { secret } => CliError::NoCredentials {
                secret: secret.to_string(),
                env: secret.default_env().into(),
                arg: secret.keyring_user().into(),
                path: resideo_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout => CliError::Timeout {
                what: "the Resideo API".into(),
            },

            CoreError::DeviceNotFound { identifier } => CliError::DeviceNotFound { identifier },

            CoreError::UnsupportedCharacteristic {
                device,
                characteristic,
            } => CliError::Validation {
                field: characteristic.to_string(),
                reason: format!("not supported by {device}"),
            },

            CoreError::ReadOnly { characteristic } => CliError::Validation {
                field: characteristic.to_string(),
                reason: "read-only".into(),
            },

            CoreError::InvalidValue {
                characteristic,
                message,
            } => CliError::Validation {
                field: characteristic.to_string(),
                reason: message,
            },

            CoreError::NotYetAvailable { device } => CliError::Timeout {
                what: format!("{device} to report its state"),
            },

            CoreError::Api { message, status } => CliError::Api { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Api {
                message,
                status: None,
            },
        }
    }
}
