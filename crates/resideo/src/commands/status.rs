//! One-shot status: a single pull, then every characteristic.

use std::time::Duration;

use resideo_core::{Characteristic, CharacteristicValue, DeviceController};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub(super) struct Reading {
    pub characteristic: Characteristic,
    pub value: CharacteristicValue,
}

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Characteristic")]
    characteristic: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub(super) fn readings(controller: &DeviceController) -> Vec<Reading> {
    controller
        .values()
        .into_iter()
        .map(|(characteristic, value)| Reading {
            characteristic,
            value,
        })
        .collect()
}

pub(super) fn print_readings(readings: &[Reading], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        readings,
        |r| ReadingRow {
            characteristic: r.characteristic.to_string(),
            value: r.value.to_string(),
        },
        |r| format!("{}={}", r.characteristic, r.value),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(session: &Session, args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = super::find_device(session, &args.device).await?;
    let controller = super::controller_for(session, &device);

    // Pull retries can take a while; allow for the full budget.
    let result = super::first_pull(&controller, Duration::from_secs(120)).await;
    controller.shutdown().await;
    result?;

    print_readings(&readings(&controller), global)
}
