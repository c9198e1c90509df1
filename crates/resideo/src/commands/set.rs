//! One reconciled write: validate, queue, wait for the loop to settle.

use std::str::FromStr;
use std::time::Duration;

use resideo_core::{Characteristic, CharacteristicValue, DeviceController, DeviceEventKind};
use tokio::sync::broadcast::error::TryRecvError;

use crate::cli::{GlobalOpts, SetArgs};
use crate::config::Session;
use crate::error::CliError;

pub async fn handle(session: &Session, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let characteristic =
        Characteristic::from_str(&args.characteristic).map_err(|_| CliError::Validation {
            field: "characteristic".into(),
            reason: format!("unknown characteristic '{}'", args.characteristic),
        })?;
    let value = characteristic
        .parse_value(&args.value)
        .map_err(|reason| CliError::Validation {
            field: characteristic.to_string(),
            reason,
        })?;

    let device = super::find_device(session, &args.device).await?;
    let controller = super::controller_for(session, &device);

    let outcome = apply(
        &controller,
        characteristic,
        value,
        Duration::from_secs(args.wait),
    )
    .await;
    controller.shutdown().await;
    outcome?;

    let readings: Vec<_> = super::status::readings(&controller)
        .into_iter()
        .filter(|r| r.characteristic == characteristic)
        .collect();
    super::status::print_readings(&readings, global)
}

async fn apply(
    controller: &DeviceController,
    characteristic: Characteristic,
    value: CharacteristicValue,
    wait: Duration,
) -> Result<(), CliError> {
    super::first_pull(controller, Duration::from_secs(120)).await?;

    let mut events = controller.events();
    controller.set(characteristic, value)?;

    if tokio::time::timeout(wait, controller.wait_settled())
        .await
        .is_err()
    {
        return Err(CliError::Timeout {
            what: format!("{} to confirm the change", controller.identity()),
        });
    }

    // Events are published before the loop reports Idle.
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let DeviceEventKind::PushAbandoned { error, .. } = event.kind {
                    return Err(CliError::PushFailed {
                        device: controller.identity().to_string(),
                        message: error,
                    });
                }
            }
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}
