use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use resideo_api::models::TemperatureUnit;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

/// A framework-facing control point. Temperatures are always Celsius.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Characteristic {
    CurrentTemperature,
    CurrentRelativeHumidity,
    TargetTemperature,
    HeatingThresholdTemperature,
    CoolingThresholdTemperature,
    TargetHeatingCoolingState,
    CurrentHeatingCoolingState,
    TemperatureDisplayUnits,
    TargetFanState,
    FanActive,
    RoomPriority,
    LeakDetected,
    BatteryLevel,
    StatusLowBattery,
    StatusActive,
    StatusFault,
    OccupancyDetected,
    MotionDetected,
    ValveActive,
    InUse,
}

impl Characteristic {
    /// Parse a user-supplied string into the value type this characteristic
    /// carries. Range checks happen later, against the device.
    pub fn parse_value(self, raw: &str) -> Result<CharacteristicValue, String> {
        let raw = raw.trim();
        match self {
            Self::CurrentTemperature
            | Self::TargetTemperature
            | Self::HeatingThresholdTemperature
            | Self::CoolingThresholdTemperature => raw
                .parse::<f64>()
                .map(CharacteristicValue::Celsius)
                .map_err(|_| format!("expected a temperature in °C, got '{raw}'")),
            Self::CurrentRelativeHumidity | Self::BatteryLevel => raw
                .parse::<f64>()
                .map(CharacteristicValue::Percent)
                .map_err(|_| format!("expected a percentage, got '{raw}'")),
            Self::TargetHeatingCoolingState | Self::CurrentHeatingCoolingState => {
                HeatingCoolingState::from_str(raw)
                    .map(CharacteristicValue::HeatingCooling)
                    .map_err(|_| format!("expected off, heat, cool or auto, got '{raw}'"))
            }
            Self::TargetFanState => TargetFanState::from_str(raw)
                .map(CharacteristicValue::FanTarget)
                .map_err(|_| format!("expected manual or auto, got '{raw}'")),
            Self::TemperatureDisplayUnits => match raw.to_ascii_lowercase().as_str() {
                "celsius" | "c" => Ok(CharacteristicValue::Units(TemperatureUnit::Celsius)),
                "fahrenheit" | "f" => Ok(CharacteristicValue::Units(TemperatureUnit::Fahrenheit)),
                _ => Err(format!("expected celsius or fahrenheit, got '{raw}'")),
            },
            Self::RoomPriority => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<u32>().map_err(|_| format!("invalid room id '{s}'")))
                .collect::<Result<BTreeSet<_>, _>>()
                .map(CharacteristicValue::Rooms),
            Self::FanActive
            | Self::LeakDetected
            | Self::StatusLowBattery
            | Self::StatusActive
            | Self::StatusFault
            | Self::OccupancyDetected
            | Self::MotionDetected
            | Self::ValveActive
            | Self::InUse => parse_bool(raw).map(CharacteristicValue::Bool),
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" | "open" | "active" => Ok(true),
        "0" | "false" | "off" | "no" | "closed" | "inactive" => Ok(false),
        _ => Err(format!("expected true or false, got '{raw}'")),
    }
}

/// HomeKit-style heating/cooling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum HeatingCoolingState {
    Off,
    Heat,
    Cool,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TargetFanState {
    Manual,
    Auto,
}

/// The value carried by a characteristic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Celsius(f64),
    Percent(f64),
    Bool(bool),
    HeatingCooling(HeatingCoolingState),
    FanTarget(TargetFanState),
    Units(TemperatureUnit),
    Rooms(BTreeSet<u32>),
}

impl CharacteristicValue {
    pub fn as_celsius(&self) -> Option<f64> {
        match self {
            Self::Celsius(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_heating_cooling(&self) -> Option<HeatingCoolingState> {
        match self {
            Self::HeatingCooling(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_fan_target(&self) -> Option<TargetFanState> {
        match self {
            Self::FanTarget(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_rooms(&self) -> Option<&BTreeSet<u32>> {
        match self {
            Self::Rooms(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius(v) => write!(f, "{v:.1} °C"),
            Self::Percent(v) => write!(f, "{v:.0}%"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::HeatingCooling(v) => write!(f, "{v}"),
            Self::FanTarget(v) => write!(f, "{v}"),
            Self::Units(v) => write!(f, "{v:?}"),
            Self::Rooms(rooms) => {
                let ids: Vec<String> = rooms.iter().map(u32::to_string).collect();
                write!(f, "[{}]", ids.join(", "))
            }
        }
    }
}
