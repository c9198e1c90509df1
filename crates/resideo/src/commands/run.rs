//! The bridge daemon: every managed device reconciled until Ctrl-C.

use resideo_core::{DeviceEvent, DeviceEventKind, FleetCoordinator};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::Session;
use crate::error::CliError;

pub async fn handle(session: Session) -> Result<(), CliError> {
    let fleet = FleetCoordinator::new(session.fleet, session.client);
    let mut events = fleet.events();

    let report = fleet.start().await?;
    info!(devices = report.total, "bridge running, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for Ctrl-C, stopping");
                }
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&fleet, &event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event log fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    fleet.shutdown().await;
    Ok(())
}

fn log_event(fleet: &FleetCoordinator, event: &DeviceEvent) {
    let device = event.device_id.as_str();
    match &event.kind {
        DeviceEventKind::Updated => {
            let Some(controller) = fleet.device(device) else {
                return;
            };
            let values = controller
                .values()
                .iter()
                .map(|(c, v)| format!("{c}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            info!(device, name = %controller.identity().name, %values, "snapshot");
        }
        DeviceEventKind::PushSucceeded { fields } => info!(device, ?fields, "change applied"),
        DeviceEventKind::PushAbandoned { fields, error } => {
            warn!(device, ?fields, %error, "change abandoned");
        }
        DeviceEventKind::PullFailed { error } => warn!(device, %error, "refresh failed"),
        DeviceEventKind::Removed => info!(device, "device removed"),
    }
}
