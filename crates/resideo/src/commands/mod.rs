//! Command dispatch plus the device lookup every per-device command uses.

pub mod config_cmd;
pub mod devices;
pub mod run;
pub mod set;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use resideo_core::{DeviceController, DiscoveredDevice, ResideoRemote, discover_devices};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cli::{Command, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;

/// Dispatch an API-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(session).await,
        Command::Devices(args) => devices::handle(&session, args, global).await,
        Command::Status(args) => status::handle(&session, args, global).await,
        Command::Set(args) => set::handle(&session, args, global).await,
        // Handled before a session exists.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

// ── Device lookup ───────────────────────────────────────────────────

/// Find a device by exact ID, else by case-insensitive name.
pub async fn find_device(session: &Session, query: &str) -> Result<DiscoveredDevice, CliError> {
    let found = discover_devices(&session.client, &session.fleet).await?;

    if let Some(device) = found.iter().find(|d| d.identity.device_id == query) {
        return Ok(device.clone());
    }

    let mut by_name: Vec<DiscoveredDevice> = found
        .into_iter()
        .filter(|d| d.identity.name.eq_ignore_ascii_case(query))
        .collect();
    match by_name.len() {
        0 => Err(CliError::DeviceNotFound {
            identifier: query.into(),
        }),
        1 => Ok(by_name.remove(0)),
        _ => Err(CliError::AmbiguousDevice {
            identifier: query.into(),
            matches: by_name
                .iter()
                .map(|d| d.identity.device_id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// A standalone controller for one-shot commands. Not started.
pub fn controller_for(session: &Session, device: &DiscoveredDevice) -> DeviceController {
    let settings = session
        .fleet
        .settings_for(&device.identity.device_id)
        .clone();
    let remote = Arc::new(ResideoRemote::new(
        session.client.clone(),
        session.fleet.room_cache_ttl,
    ));
    let (events, _) = broadcast::channel(64);
    DeviceController::new(
        device.identity.clone(),
        settings,
        remote,
        Arc::clone(session.client.tokens()),
        events,
        CancellationToken::new(),
    )
}

/// Start `controller` and wait for its first pull.
pub async fn first_pull(controller: &DeviceController, within: Duration) -> Result<(), CliError> {
    controller.start().await;
    match tokio::time::timeout(within, controller.wait_for_remote()).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(CliError::Timeout {
            what: format!("{} to report its state", controller.identity()),
        }),
    }
}
