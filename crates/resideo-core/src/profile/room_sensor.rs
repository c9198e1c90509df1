use resideo_api::models::{RoomAccessory, TemperatureUnit};

use crate::convert::to_celsius;
use crate::model::{Characteristic, CharacteristicValue};

/// A T9 wireless room sensor. Readings come from the parent thermostat's
/// rooms listing, in the thermostat's units.
#[derive(Debug, Clone)]
pub struct RoomSensorProfile {
    units: TemperatureUnit,
}

impl RoomSensorProfile {
    pub fn new(units: TemperatureUnit) -> Self {
        Self { units }
    }

    pub fn characteristics() -> Vec<Characteristic> {
        vec![
            Characteristic::CurrentTemperature,
            Characteristic::CurrentRelativeHumidity,
            Characteristic::OccupancyDetected,
            Characteristic::MotionDetected,
            Characteristic::StatusLowBattery,
            Characteristic::StatusFault,
        ]
    }

    pub fn project(
        &self,
        accessory: &RoomAccessory,
        characteristic: Characteristic,
    ) -> Option<CharacteristicValue> {
        let value = accessory.accessory_value.as_ref()?;
        match characteristic {
            Characteristic::CurrentTemperature => value
                .indoor_temperature
                .map(|t| CharacteristicValue::Celsius(to_celsius(t, self.units))),
            Characteristic::CurrentRelativeHumidity => {
                value.indoor_humidity.map(CharacteristicValue::Percent)
            }
            Characteristic::OccupancyDetected => value.occupancy_det.map(CharacteristicValue::Bool),
            Characteristic::MotionDetected => value.motion_det.map(CharacteristicValue::Bool),
            Characteristic::StatusLowBattery => value
                .battery_status
                .as_deref()
                .map(|status| CharacteristicValue::Bool(!status.starts_with("Ok"))),
            Characteristic::StatusFault => value
                .status
                .as_deref()
                .map(|status| CharacteristicValue::Bool(status != "Ok")),
            _ => None,
        }
    }
}
