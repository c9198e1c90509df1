//! CLI configuration — thin wrapper around `resideo_config`.
//!
//! Adds `GlobalOpts` overrides (--config, --timeout) and builds the API
//! client every device-facing command shares.

use std::path::PathBuf;
use std::sync::Arc;

use resideo_api::ResideoClient;
use resideo_config::{CredentialTokenSource, Secret, resolve_secret};
use resideo_core::{CoreError, FleetConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use resideo_config::{Config, config_path};

/// `--config` if given, else the platform default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load and validate the config with flag overrides applied.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = resideo_config::load_config_from(&active_path(global))?;
    if let Some(timeout) = global.timeout {
        cfg.options.timeout = timeout;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Everything a device-facing command needs.
pub struct Session {
    pub fleet: FleetConfig,
    pub client: ResideoClient,
}

/// Resolve credentials and build the API client.
pub fn connect(global: &GlobalOpts) -> Result<Session, CliError> {
    let cfg = load(global)?;
    let fleet = cfg.to_fleet_config()?;

    let consumer_key = resolve_secret(&cfg.credentials, Secret::ConsumerKey)?;
    let tokens = Arc::new(CredentialTokenSource::new(cfg.credentials.clone())?);
    let client = ResideoClient::new(cfg.base_url()?, consumer_key, tokens, &cfg.transport())
        .map_err(CoreError::from)?;

    Ok(Session { fleet, client })
}
