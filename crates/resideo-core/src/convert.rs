// ── Temperature conversion ──
//
// The vendor reports and accepts temperatures in the device's configured
// units; characteristics are always Celsius. Fahrenheit readings become
// half-degree Celsius values, Celsius values become whole Fahrenheit
// degrees. The round trip C → F → C is therefore exact to within 0.5 °C.

use resideo_api::models::TemperatureUnit;

/// Fahrenheit → Celsius, rounded to the nearest half degree.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    ((5.0 / 9.0) * (fahrenheit - 32.0) * 2.0).round() / 2.0
}

/// Celsius → Fahrenheit, rounded to the nearest whole degree.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    (celsius * 9.0 / 5.0 + 32.0).round()
}

/// Convert a vendor reading in `unit` to Celsius.
pub fn to_celsius(value: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Fahrenheit => fahrenheit_to_celsius(value),
        TemperatureUnit::Celsius => value,
    }
}

/// Convert a Celsius characteristic value to what the vendor expects for `unit`.
pub fn to_device_units(celsius: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
        TemperatureUnit::Celsius => (celsius * 2.0).round() / 2.0,
    }
}
