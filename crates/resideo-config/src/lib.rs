//! Configuration for the resideo bridge.
//!
//! A TOML file layered with `RESIDEO_` environment variables, credential
//! resolution (env + keyring + plaintext), and translation to
//! `resideo_core::FleetConfig`. The binary adds flag-aware wrappers on top.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use resideo_api::models::PriorityType;
use resideo_api::{DEFAULT_BASE_URL, TokenSource, TransportConfig};
use resideo_core::{DeviceLogging, DeviceSettings, FleetConfig, PushFailurePolicy};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyring service under which secrets are stored.
pub const KEYRING_SERVICE: &str = "resideo";

/// Shortest accepted pull period, in seconds.
pub const MIN_REFRESH_RATE: u64 = 30;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured")]
    NoCredentials { secret: Secret },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,

    /// Defaults for every device.
    #[serde(default)]
    pub options: Options,

    /// Per-device overrides.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Where the consumer key and access token come from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Credentials {
    /// Consumer key (plaintext; prefer keyring or env var).
    pub consumer_key: Option<String>,

    /// Environment variable holding the consumer key.
    pub consumer_key_env: Option<String>,

    /// Access token (plaintext; prefer keyring or env var).
    pub access_token: Option<String>,

    /// Environment variable holding the access token.
    pub access_token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Options {
    /// Seconds between periodic pulls.
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u64,

    /// Debounce window in seconds.
    #[serde(default = "default_push_rate")]
    pub push_rate: f64,

    #[serde(default = "default_true")]
    pub retry: bool,

    /// `standard`, `debug` or `none`.
    #[serde(default = "default_logging")]
    pub logging: String,

    /// Seconds between discovery passes; 0 disables re-discovery.
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval: u64,

    /// Seconds between scheduled token refreshes; 0 disables them.
    #[serde(default = "default_token_refresh_interval")]
    pub token_refresh_interval: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Vendor API root override.
    pub base_url: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            refresh_rate: default_refresh_rate(),
            push_rate: default_push_rate(),
            retry: true,
            logging: default_logging(),
            discovery_interval: default_discovery_interval(),
            token_refresh_interval: default_token_refresh_interval(),
            timeout: default_timeout(),
            base_url: None,
        }
    }
}

fn default_refresh_rate() -> u64 {
    120
}
fn default_push_rate() -> f64 {
    0.1
}
fn default_true() -> bool {
    true
}
fn default_logging() -> String {
    "standard".into()
}
fn default_discovery_interval() -> u64 {
    3600
}
fn default_token_refresh_interval() -> u64 {
    600
}
fn default_timeout() -> u64 {
    30
}

/// One `[[devices]]` entry. Unset fields inherit from `[options]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub device_id: String,

    #[serde(default)]
    pub hide_device: bool,

    pub refresh_rate: Option<u64>,
    pub push_rate: Option<f64>,
    pub retry: Option<bool>,
    pub logging: Option<String>,

    #[serde(default)]
    pub thermostat: ThermostatConfig,

    #[serde(default)]
    pub leak_sensor: LeakSensorConfig,

    #[serde(default)]
    pub valve: ValveConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ThermostatConfig {
    #[serde(default)]
    pub hide_fan: bool,
    #[serde(default)]
    pub hide_humidity: bool,
    #[serde(default)]
    pub show_auto: bool,
    #[serde(default)]
    pub hide_room_sensors: bool,
    #[serde(default)]
    pub room_thermostats: bool,
    /// `PermanentHold`, `NoHold`, `TemporaryHold` ...
    pub thermostat_setpoint_status: Option<String>,
    /// `silent` or `fault`.
    pub push_failure: Option<String>,
    #[serde(default)]
    pub room_priority: bool,
    pub priority_type: Option<PriorityType>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeakSensorConfig {
    #[serde(default)]
    pub hide_temperature: bool,
    #[serde(default)]
    pub hide_humidity: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ValveConfig {
    /// `silent` or `fault`.
    pub push_failure: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "resideo", "resideo").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("resideo");
    p
}

// ── Loading & saving ────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (a missing file means defaults) layered with
/// `RESIDEO_` variables. Nested keys use `__`: `RESIDEO_OPTIONS__RETRY=false`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RESIDEO_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Serialize config to pretty TOML at `path`, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_refresh_rate("options.refresh_rate", self.options.refresh_rate)?;
        check_push_rate("options.push_rate", self.options.push_rate)?;
        parse_logging("options.logging", &self.options.logging)?;
        if self.options.timeout == 0 {
            return Err(invalid("options.timeout", "must be at least 1 second"));
        }
        if let Some(base) = &self.options.base_url {
            parse_base_url(base)?;
        }

        for device in &self.devices {
            let field = |name: &str| format!("devices.{}.{name}", device.device_id);
            if device.device_id.is_empty() {
                return Err(invalid("devices.device_id", "must not be empty"));
            }
            if let Some(rate) = device.refresh_rate {
                check_refresh_rate(&field("refresh_rate"), rate)?;
            }
            if let Some(rate) = device.push_rate {
                check_push_rate(&field("push_rate"), rate)?;
            }
            if let Some(logging) = &device.logging {
                parse_logging(&field("logging"), logging)?;
            }
            if let Some(policy) = &device.thermostat.push_failure {
                parse_push_failure(&field("thermostat.push_failure"), policy)?;
            }
            if let Some(policy) = &device.valve.push_failure {
                parse_push_failure(&field("valve.push_failure"), policy)?;
            }
        }
        Ok(())
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    /// Build the runtime fleet configuration.
    pub fn to_fleet_config(&self) -> Result<FleetConfig, ConfigError> {
        self.validate()?;

        let defaults = DeviceSettings {
            refresh_interval: Duration::from_secs(self.options.refresh_rate),
            push_delay: push_delay("options.push_rate", self.options.push_rate)?,
            retry: self.options.retry,
            logging: parse_logging("options.logging", &self.options.logging)?,
            ..DeviceSettings::default()
        };

        let mut fleet = FleetConfig {
            discovery_interval: Duration::from_secs(self.options.discovery_interval),
            token_refresh_interval: Duration::from_secs(self.options.token_refresh_interval),
            ..FleetConfig::default()
        };
        for device in &self.devices {
            let settings = device.apply(&defaults)?;
            fleet.devices.insert(device.device_id.clone(), settings);
        }
        fleet.defaults = defaults;
        Ok(fleet)
    }

    /// HTTP settings for `ResideoClient::new`.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(Duration::from_secs(self.options.timeout))
    }

    pub fn base_url(&self) -> Result<url::Url, ConfigError> {
        parse_base_url(self.options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
    }
}

impl DeviceConfig {
    /// Layer this override onto the fleet-wide defaults.
    fn apply(&self, defaults: &DeviceSettings) -> Result<DeviceSettings, ConfigError> {
        let field = |name: &str| format!("devices.{}.{name}", self.device_id);
        let mut settings = defaults.clone();

        settings.hidden = self.hide_device;
        if let Some(rate) = self.refresh_rate {
            settings.refresh_interval = Duration::from_secs(rate);
        }
        if let Some(rate) = self.push_rate {
            settings.push_delay = push_delay(&field("push_rate"), rate)?;
        }
        if let Some(retry) = self.retry {
            settings.retry = retry;
        }
        if let Some(logging) = &self.logging {
            settings.logging = parse_logging(&field("logging"), logging)?;
        }

        let thermostat = &mut settings.thermostat;
        thermostat.hide_fan = self.thermostat.hide_fan;
        thermostat.hide_humidity = self.thermostat.hide_humidity;
        thermostat.show_auto = self.thermostat.show_auto;
        thermostat.hide_room_sensors = self.thermostat.hide_room_sensors;
        thermostat.room_thermostats = self.thermostat.room_thermostats;
        thermostat.room_priority = self.thermostat.room_priority;
        if let Some(status) = &self.thermostat.thermostat_setpoint_status {
            thermostat.setpoint_status.clone_from(status);
        }
        if let Some(priority) = self.thermostat.priority_type {
            thermostat.priority_type = priority;
        }
        if let Some(policy) = &self.thermostat.push_failure {
            thermostat.push_failure = parse_push_failure(&field("thermostat.push_failure"), policy)?;
        }

        settings.leak_sensor.hide_temperature = self.leak_sensor.hide_temperature;
        settings.leak_sensor.hide_humidity = self.leak_sensor.hide_humidity;

        if let Some(policy) = &self.valve.push_failure {
            settings.valve.push_failure = parse_push_failure(&field("valve.push_failure"), policy)?;
        }
        Ok(settings)
    }
}

fn check_refresh_rate(field: &str, rate: u64) -> Result<(), ConfigError> {
    if rate < MIN_REFRESH_RATE {
        return Err(invalid(
            field,
            format!("must be at least {MIN_REFRESH_RATE} seconds, got {rate}"),
        ));
    }
    Ok(())
}

fn check_push_rate(field: &str, rate: f64) -> Result<(), ConfigError> {
    push_delay(field, rate).map(|_| ())
}

fn push_delay(field: &str, rate: f64) -> Result<Duration, ConfigError> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(invalid(field, format!("must be a positive number of seconds, got {rate}")));
    }
    Duration::try_from_secs_f64(rate).map_err(|e| invalid(field, e.to_string()))
}

fn parse_logging(field: &str, raw: &str) -> Result<DeviceLogging, ConfigError> {
    raw.parse().map_err(|_| {
        invalid(
            field,
            format!("expected 'standard', 'debug', or 'none', got '{raw}'"),
        )
    })
}

fn parse_push_failure(field: &str, raw: &str) -> Result<PushFailurePolicy, ConfigError> {
    raw.parse()
        .map_err(|_| invalid(field, format!("expected 'silent' or 'fault', got '{raw}'")))
}

fn parse_base_url(raw: &str) -> Result<url::Url, ConfigError> {
    // Endpoint paths are joined relative to the root.
    let normalized = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };
    normalized
        .parse()
        .map_err(|_| invalid("options.base_url", format!("invalid URL: {raw}")))
}

// ── Credential resolution ───────────────────────────────────────────

/// The two secrets the bridge needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    ConsumerKey,
    AccessToken,
}

impl Secret {
    /// Keyring user name for this secret.
    pub fn keyring_user(self) -> &'static str {
        match self {
            Self::ConsumerKey => "consumer-key",
            Self::AccessToken => "access-token",
        }
    }

    /// Variable consulted when the config names none.
    pub fn default_env(self) -> &'static str {
        match self {
            Self::ConsumerKey => "RESIDEO_CONSUMER_KEY",
            Self::AccessToken => "RESIDEO_ACCESS_TOKEN",
        }
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsumerKey => f.write_str("consumer key"),
            Self::AccessToken => f.write_str("access token"),
        }
    }
}

/// Resolve a secret: env var → system keyring → plaintext in config.
pub fn resolve_secret(credentials: &Credentials, secret: Secret) -> Result<SecretString, ConfigError> {
    let (env_name, plaintext) = match secret {
        Secret::ConsumerKey => (&credentials.consumer_key_env, &credentials.consumer_key),
        Secret::AccessToken => (&credentials.access_token_env, &credentials.access_token),
    };

    // 1. Named (or conventional) env var
    let env_name = env_name.as_deref().unwrap_or(secret.default_env());
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, secret.keyring_user()) {
        if let Ok(val) = entry.get_password() {
            return Ok(SecretString::from(val));
        }
    }

    // 3. Plaintext in config
    if let Some(val) = plaintext {
        return Ok(SecretString::from(val.clone()));
    }

    Err(ConfigError::NoCredentials { secret })
}

/// Store a secret in the system keyring.
pub fn store_secret(secret: Secret, value: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, secret.keyring_user())?;
    entry.set_password(value)?;
    Ok(())
}

/// Access token source backed by the credential chain.
///
/// The OAuth login helper writes new tokens to the keyring (or the
/// environment of a restarted service); `refresh` picks them up.
pub struct CredentialTokenSource {
    credentials: Credentials,
    current: ArcSwap<SecretString>,
}

impl CredentialTokenSource {
    /// Resolve the initial token. Fails when no access token is configured.
    pub fn new(credentials: Credentials) -> Result<Self, ConfigError> {
        let token = resolve_secret(&credentials, Secret::AccessToken)?;
        Ok(Self {
            credentials,
            current: ArcSwap::from_pointee(token),
        })
    }
}

#[async_trait]
impl TokenSource for CredentialTokenSource {
    fn access_token(&self) -> SecretString {
        SecretString::clone(&self.current.load())
    }

    async fn refresh(&self) -> Result<(), resideo_api::Error> {
        let token = resolve_secret(&self.credentials, Secret::AccessToken).map_err(|e| {
            resideo_api::Error::TokenRefresh {
                message: e.to_string(),
            }
        })?;
        self.current.store(Arc::new(token));
        Ok(())
    }
}
