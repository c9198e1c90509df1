use resideo_api::models::{FanState, LeakDetector, Priority, RoomAccessory, ShutoffValve, Thermostat};

/// Everything the vendor last reported for one device.
///
/// Replaced wholesale after every successful pull; never patched.
#[derive(Debug, Clone)]
pub enum RemoteState {
    Thermostat(ThermostatState),
    LeakSensor(LeakDetector),
    RoomSensor(RoomAccessory),
    RoomThermostat(RoomThermostatState),
    Valve(ShutoffValve),
}

/// A thermostat pull spans up to three resources.
#[derive(Debug, Clone)]
pub struct ThermostatState {
    pub thermostat: Thermostat,
    /// Present when the device has a fan and fan control is enabled.
    pub fan: Option<FanState>,
    /// Present when room priority is enabled for a model that supports it.
    pub priority: Option<Priority>,
}

/// The parent thermostat plus the room accessory it is steered from.
#[derive(Debug, Clone)]
pub struct RoomThermostatState {
    /// Always carries `priority`; writes compare against it.
    pub thermostat: ThermostatState,
    pub accessory: RoomAccessory,
}

impl RemoteState {
    pub fn as_thermostat(&self) -> Option<&ThermostatState> {
        match self {
            Self::Thermostat(state) => Some(state),
            Self::RoomThermostat(state) => Some(&state.thermostat),
            _ => None,
        }
    }
}
