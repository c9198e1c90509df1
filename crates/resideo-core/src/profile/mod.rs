// ── Device class profiles ──
//
// One `DeviceController` drives every kind of device. What differs per
// class (which characteristics exist, how they project from the vendor
// payload, what a push looks like) lives here.

mod leak_sensor;
mod room_sensor;
mod room_thermostat;
mod thermostat;
mod valve;

use std::time::Duration;

pub use leak_sensor::LeakSensorProfile;
pub use room_sensor::RoomSensorProfile;
pub use room_thermostat::RoomThermostatProfile;
pub use thermostat::ThermostatProfile;
pub use valve::ValveProfile;

use crate::config::{DeviceSettings, PushFailurePolicy};
use crate::error::CoreError;
use crate::model::{
    Characteristic, CharacteristicValue, DeviceClass, DeviceIdentity, IntentBatch, PendingIntent,
    RemoteState,
};
use crate::remote::PushRequest;

/// Class-specific behaviour for one device.
#[derive(Debug, Clone)]
pub enum DeviceProfile {
    Thermostat(ThermostatProfile),
    LeakSensor(LeakSensorProfile),
    RoomSensor(RoomSensorProfile),
    RoomThermostat(RoomThermostatProfile),
    Valve(ValveProfile),
}

impl DeviceProfile {
    pub fn for_device(identity: &DeviceIdentity, settings: &DeviceSettings) -> Self {
        match identity.class {
            DeviceClass::Thermostat => Self::Thermostat(ThermostatProfile::new(
                &identity.model,
                settings.thermostat.clone(),
            )),
            DeviceClass::LeakSensor => {
                Self::LeakSensor(LeakSensorProfile::new(settings.leak_sensor.clone()))
            }
            DeviceClass::RoomSensor => Self::RoomSensor(RoomSensorProfile::new(
                identity.room.as_ref().map(|room| room.units).unwrap_or_default(),
            )),
            DeviceClass::RoomThermostat => Self::RoomThermostat(RoomThermostatProfile::new(
                &identity.model,
                settings.thermostat.clone(),
                identity.room.as_ref().map_or(0, |room| room.room_id),
            )),
            DeviceClass::Valve => Self::Valve(ValveProfile::new(settings.valve.clone())),
        }
    }

    pub fn class(&self) -> DeviceClass {
        match self {
            Self::Thermostat(_) => DeviceClass::Thermostat,
            Self::LeakSensor(_) => DeviceClass::LeakSensor,
            Self::RoomSensor(_) => DeviceClass::RoomSensor,
            Self::RoomThermostat(_) => DeviceClass::RoomThermostat,
            Self::Valve(_) => DeviceClass::Valve,
        }
    }

    /// Characteristics this device exposes. Before the first pull only the
    /// ones every device of the class has are listed.
    pub fn characteristics(&self, remote: Option<&RemoteState>) -> Vec<Characteristic> {
        match (self, remote) {
            (Self::Thermostat(p), Some(RemoteState::Thermostat(state))) => {
                p.characteristics(Some(state))
            }
            (Self::Thermostat(p), _) => p.characteristics(None),
            (Self::LeakSensor(p), _) => p.characteristics(),
            (Self::RoomSensor(_), _) => RoomSensorProfile::characteristics(),
            (Self::RoomThermostat(p), Some(RemoteState::RoomThermostat(state))) => {
                p.characteristics(Some(state))
            }
            (Self::RoomThermostat(p), _) => p.characteristics(None),
            (Self::Valve(_), _) => ValveProfile::characteristics(),
        }
    }

    pub fn is_writable(&self, characteristic: Characteristic) -> bool {
        match self {
            Self::Thermostat(p) => p.is_writable(characteristic),
            Self::RoomThermostat(_) => RoomThermostatProfile::is_writable(characteristic),
            Self::Valve(_) => characteristic == Characteristic::ValveActive,
            Self::LeakSensor(_) | Self::RoomSensor(_) => false,
        }
    }

    /// Project one characteristic out of the vendor snapshot. `pending` is
    /// consulted for values derived from other, not yet confirmed, fields.
    pub fn project(
        &self,
        remote: &RemoteState,
        pending: &PendingIntent,
        characteristic: Characteristic,
    ) -> Option<CharacteristicValue> {
        match (self, remote) {
            (Self::Thermostat(p), RemoteState::Thermostat(state)) => {
                p.project(state, pending, characteristic)
            }
            (Self::LeakSensor(p), RemoteState::LeakSensor(detector)) => {
                p.project(detector, characteristic)
            }
            (Self::RoomSensor(p), RemoteState::RoomSensor(accessory)) => {
                p.project(accessory, characteristic)
            }
            (Self::RoomThermostat(p), RemoteState::RoomThermostat(state)) => {
                p.project(state, pending, characteristic)
            }
            (Self::Valve(_), RemoteState::Valve(valve)) => ValveProfile::project(valve, characteristic),
            _ => None,
        }
    }

    /// Check a local write before it is accepted into the pending intent.
    pub fn validate(
        &self,
        device: &str,
        remote: Option<&RemoteState>,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), CoreError> {
        if !self.characteristics(remote).contains(&characteristic) {
            return Err(CoreError::UnsupportedCharacteristic {
                device: device.to_owned(),
                characteristic,
            });
        }
        if !self.is_writable(characteristic) {
            return Err(CoreError::ReadOnly { characteristic });
        }
        check_kind(characteristic, value)?;

        match (self, remote) {
            (Self::Thermostat(p), Some(RemoteState::Thermostat(state))) => {
                p.validate(state, characteristic, value)
            }
            (Self::Thermostat(p), _) => p.validate_without_state(characteristic, value),
            (Self::RoomThermostat(p), Some(RemoteState::RoomThermostat(state))) => {
                p.validate(Some(state), characteristic, value)
            }
            (Self::RoomThermostat(p), _) => p.validate(None, characteristic, value),
            _ => Ok(()),
        }
    }

    /// Translate a frozen intent into the vendor requests that apply it,
    /// in the order they must be sent. Empty when nothing needs sending.
    pub fn build_push(&self, remote: &RemoteState, batch: &IntentBatch) -> Vec<PushRequest> {
        match (self, remote) {
            (Self::Thermostat(p), RemoteState::Thermostat(state)) => p.build_push(state, batch),
            (Self::RoomThermostat(p), RemoteState::RoomThermostat(state)) => {
                p.build_push(state, batch)
            }
            (Self::Valve(_), RemoteState::Valve(_)) => ValveProfile::build_push(batch),
            _ => Vec::new(),
        }
    }

    pub fn push_failure(&self) -> PushFailurePolicy {
        match self {
            Self::Thermostat(p) => p.options().push_failure,
            Self::RoomThermostat(p) => p.options().push_failure,
            Self::Valve(p) => p.options().push_failure,
            Self::LeakSensor(_) | Self::RoomSensor(_) => PushFailurePolicy::Silent,
        }
    }

    /// Quiet period before pushing `pending`. Room priority changes are
    /// toggled from switches rather than dragged, so they wait half as long.
    pub fn debounce_window(&self, base: Duration, pending: &PendingIntent) -> Duration {
        let priority_only = !pending.is_empty()
            && pending
                .characteristics()
                .all(|c| c == Characteristic::RoomPriority);
        if priority_only { base / 2 } else { base }
    }

    /// Whether a thermostat pull should include the fan resource.
    pub fn wants_fan(&self) -> bool {
        matches!(self, Self::Thermostat(p) if !p.options().hide_fan)
    }

    /// Whether a thermostat pull should include the room priority resource.
    pub fn wants_priority(&self) -> bool {
        matches!(self, Self::Thermostat(p) if p.supports_room_priority())
    }
}

fn check_kind(characteristic: Characteristic, value: &CharacteristicValue) -> Result<(), CoreError> {
    use Characteristic as C;
    use CharacteristicValue as V;

    let ok = match characteristic {
        C::CurrentTemperature
        | C::TargetTemperature
        | C::HeatingThresholdTemperature
        | C::CoolingThresholdTemperature => matches!(value, V::Celsius(v) if v.is_finite()),
        C::CurrentRelativeHumidity | C::BatteryLevel => matches!(value, V::Percent(_)),
        C::TargetHeatingCoolingState | C::CurrentHeatingCoolingState => {
            matches!(value, V::HeatingCooling(_))
        }
        C::TargetFanState => matches!(value, V::FanTarget(_)),
        C::TemperatureDisplayUnits => matches!(value, V::Units(_)),
        C::RoomPriority => matches!(value, V::Rooms(_)),
        C::FanActive
        | C::LeakDetected
        | C::StatusLowBattery
        | C::StatusActive
        | C::StatusFault
        | C::OccupancyDetected
        | C::MotionDetected
        | C::ValveActive
        | C::InUse => matches!(value, V::Bool(_)),
    };
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidValue {
            characteristic,
            message: format!("unexpected value {value}"),
        })
    }
}
