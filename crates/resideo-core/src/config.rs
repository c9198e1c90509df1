// ── Runtime bridge configuration ──
//
// These types describe how each device is reconciled. They never touch
// disk: `resideo-config` reads the TOML file and hands these in.

use std::collections::HashMap;
use std::time::Duration;

use resideo_api::models::PriorityType;
use strum::{Display, EnumString};

use crate::reconcile::RetryPolicy;

/// Per-device log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceLogging {
    /// Lifecycle and failures.
    #[default]
    Standard,
    /// Also promote per-request detail to info.
    Debug,
    /// Only errors.
    None,
}

impl DeviceLogging {
    pub fn is_verbose(self) -> bool {
        self == Self::Debug
    }

    pub fn is_quiet(self) -> bool {
        self == Self::None
    }
}

/// What a device shows after a push is abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PushFailurePolicy {
    /// Drop the intent; the next pull restores the confirmed value.
    #[default]
    Silent,
    /// Also raise `StatusFault` until the next successful pull.
    Fault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermostatOptions {
    pub hide_fan: bool,
    pub hide_humidity: bool,
    /// Offer Auto even when the device does not list it.
    pub show_auto: bool,
    pub hide_room_sensors: bool,
    /// Also expose each room sensor as a thermostat for its room.
    pub room_thermostats: bool,
    /// Sent as `thermostatSetpointStatus` (omitted for Round models).
    pub setpoint_status: String,
    pub room_priority: bool,
    pub priority_type: PriorityType,
    pub push_failure: PushFailurePolicy,
}

impl Default for ThermostatOptions {
    fn default() -> Self {
        Self {
            hide_fan: false,
            hide_humidity: false,
            show_auto: false,
            hide_room_sensors: false,
            room_thermostats: false,
            setpoint_status: "PermanentHold".into(),
            room_priority: false,
            priority_type: PriorityType::PickARoom,
            push_failure: PushFailurePolicy::Silent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakSensorOptions {
    pub hide_temperature: bool,
    pub hide_humidity: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValveOptions {
    pub push_failure: PushFailurePolicy,
}

impl Default for ValveOptions {
    fn default() -> Self {
        Self {
            push_failure: PushFailurePolicy::Fault,
        }
    }
}

/// Fully resolved settings for one device.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub hidden: bool,
    /// Periodic pull interval.
    pub refresh_interval: Duration,
    /// Debounce window after the last local change.
    pub push_delay: Duration,
    /// Enables the backoff-retry path; without it each action is tried once.
    pub retry: bool,
    pub logging: DeviceLogging,
    pub push_retry: RetryPolicy,
    pub pull_retry: RetryPolicy,
    pub thermostat: ThermostatOptions,
    pub leak_sensor: LeakSensorOptions,
    pub valve: ValveOptions,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            hidden: false,
            refresh_interval: Duration::from_secs(120),
            push_delay: Duration::from_millis(100),
            retry: true,
            logging: DeviceLogging::Standard,
            push_retry: RetryPolicy::for_push(),
            pull_retry: RetryPolicy::for_pull(),
            thermostat: ThermostatOptions::default(),
            leak_sensor: LeakSensorOptions::default(),
            valve: ValveOptions::default(),
        }
    }
}

/// Configuration for the whole fleet.
///
/// Built by the CLI from `resideo-config`, passed to `FleetCoordinator`.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub defaults: DeviceSettings,
    /// Per-device overrides keyed by vendor device ID.
    pub devices: HashMap<String, DeviceSettings>,
    /// How often to re-run discovery. Zero disables periodic discovery.
    pub discovery_interval: Duration,
    /// How often to refresh the shared access token. Zero disables it.
    pub token_refresh_interval: Duration,
    /// Lifetime of cached room sensor readings.
    pub room_cache_ttl: Duration,
}

impl FleetConfig {
    /// Settings for one device: its override if present, else the defaults.
    pub fn settings_for(&self, device_id: &str) -> &DeviceSettings {
        self.devices.get(device_id).unwrap_or(&self.defaults)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            defaults: DeviceSettings::default(),
            devices: HashMap::new(),
            discovery_interval: Duration::from_secs(3600),
            token_refresh_interval: Duration::from_secs(600),
            room_cache_ttl: Duration::from_secs(45),
        }
    }
}
