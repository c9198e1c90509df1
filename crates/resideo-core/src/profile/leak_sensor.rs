use resideo_api::models::LeakDetector;

use crate::config::LeakSensorOptions;
use crate::model::{Characteristic, CharacteristicValue};

/// Battery percentage below which a leak detector reports low battery.
const LOW_BATTERY_PERCENT: f64 = 15.0;

/// Water leak detector. Read-only.
#[derive(Debug, Clone)]
pub struct LeakSensorProfile {
    options: LeakSensorOptions,
}

impl LeakSensorProfile {
    pub fn new(options: LeakSensorOptions) -> Self {
        Self { options }
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        let mut list = vec![
            Characteristic::LeakDetected,
            Characteristic::BatteryLevel,
            Characteristic::StatusLowBattery,
            Characteristic::StatusActive,
            Characteristic::StatusFault,
        ];
        if !self.options.hide_temperature {
            list.push(Characteristic::CurrentTemperature);
        }
        if !self.options.hide_humidity {
            list.push(Characteristic::CurrentRelativeHumidity);
        }
        list
    }

    pub fn project(
        &self,
        detector: &LeakDetector,
        characteristic: Characteristic,
    ) -> Option<CharacteristicValue> {
        let readings = detector.current_sensor_readings.as_ref();
        match characteristic {
            Characteristic::LeakDetected => Some(CharacteristicValue::Bool(detector.water_present)),
            Characteristic::BatteryLevel => detector.battery_remaining.map(CharacteristicValue::Percent),
            Characteristic::StatusLowBattery => detector
                .battery_remaining
                .map(|level| CharacteristicValue::Bool(level < LOW_BATTERY_PERCENT)),
            Characteristic::StatusActive => {
                Some(CharacteristicValue::Bool(detector.has_device_checked_in))
            }
            Characteristic::StatusFault => Some(CharacteristicValue::Bool(!detector.is_alive)),
            // Leak detectors report Celsius regardless of the location's units.
            Characteristic::CurrentTemperature if !self.options.hide_temperature => {
                readings?.temperature.map(CharacteristicValue::Celsius)
            }
            Characteristic::CurrentRelativeHumidity if !self.options.hide_humidity => {
                readings?.humidity.map(CharacteristicValue::Percent)
            }
            _ => None,
        }
    }
}
