//! Device listing.

use resideo_core::{DiscoveredDevice, discover_devices};
use tabled::Tabled;

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "State")]
    state: String,
}

fn row(d: &DiscoveredDevice, color: bool) -> DeviceRow {
    let state = match (d.alive, d.hidden) {
        (_, true) => output::status_cell("hidden", true, false),
        (true, false) => output::status_cell("online", true, color),
        (false, false) => output::status_cell("offline", false, color),
    };
    DeviceRow {
        id: d.identity.device_id.clone(),
        name: d.identity.name.clone(),
        class: d.identity.class.to_string(),
        model: d.identity.model.clone(),
        location: d.location_name.clone(),
        state,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut found = discover_devices(&session.client, &session.fleet).await?;
    if !args.all {
        found.retain(DiscoveredDevice::is_managed);
    }
    found.sort_by(|a, b| a.identity.name.cmp(&b.identity.name));

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &found,
        |d| row(d, color),
        |d| d.identity.device_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
