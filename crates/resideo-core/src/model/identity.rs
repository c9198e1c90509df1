use std::fmt;

use resideo_api::models::TemperatureUnit;
use serde::Serialize;
use strum::{Display, EnumString};

/// Which family of vendor resource backs a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DeviceClass {
    Thermostat,
    LeakSensor,
    RoomSensor,
    /// A room sensor driven as a thermostat that prioritizes its room.
    RoomThermostat,
    Valve,
}

impl DeviceClass {
    /// Map the vendor's `deviceClass` string. `None` for unsupported hardware.
    pub fn from_vendor(device_class: &str) -> Option<Self> {
        match device_class {
            "Thermostat" => Some(Self::Thermostat),
            "LeakDetector" => Some(Self::LeakSensor),
            "ShutoffValve" => Some(Self::Valve),
            _ => None,
        }
    }
}

/// Where a T9 room sensor lives: the parent thermostat, its sensor group,
/// the room and the accessory within the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoomRef {
    pub thermostat_id: String,
    pub group_id: u32,
    pub room_id: u32,
    pub accessory_id: u32,
    /// Units the parent thermostat reports room readings in.
    pub units: TemperatureUnit,
}

/// Immutable identity of one device. Created at discovery, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub class: DeviceClass,
    pub location_id: u64,
    pub name: String,
    pub model: String,
    pub room: Option<RoomRef>,
}

impl DeviceIdentity {
    pub fn new(
        device_id: impl Into<String>,
        class: DeviceClass,
        location_id: u64,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            class,
            location_id,
            name: name.into(),
            model: model.into(),
            room: None,
        }
    }

    /// A room sensor accessory on a T9 thermostat.
    pub fn room_sensor(location_id: u64, name: impl Into<String>, model: impl Into<String>, room: RoomRef) -> Self {
        Self {
            device_id: format!("{}-{}-{}", room.thermostat_id, room.room_id, room.accessory_id),
            class: DeviceClass::RoomSensor,
            location_id,
            name: name.into(),
            model: model.into(),
            room: Some(room),
        }
    }

    /// A room sensor exposed as a thermostat. Writes go to the parent
    /// thermostat, so the model is the parent's.
    pub fn room_thermostat(
        location_id: u64,
        name: impl Into<String>,
        thermostat_model: impl Into<String>,
        room: RoomRef,
    ) -> Self {
        Self {
            device_id: format!(
                "{}-{}-{}-thermostat",
                room.thermostat_id, room.room_id, room.accessory_id
            ),
            class: DeviceClass::RoomThermostat,
            location_id,
            name: name.into(),
            model: thermostat_model.into(),
            room: Some(room),
        }
    }

    /// The vendor device requests are addressed to. Room accessories
    /// live under their parent thermostat.
    pub fn vendor_id(&self) -> &str {
        self.room
            .as_ref()
            .map_or(self.device_id.as_str(), |room| room.thermostat_id.as_str())
    }

    /// Stable key across discovery passes: `{device_id}-{class}`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.device_id, self.class)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.class, self.device_id)
    }
}
