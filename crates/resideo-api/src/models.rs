// Wire types for the Resideo cloud API.
//
// Field names follow the vendor's camelCase JSON. Everything the vendor
// sometimes leaves out is either `Option` or `#[serde(default)]` so a sparse
// response still deserializes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn default_true() -> bool {
    true
}

// ── Discovery ───────────────────────────────────────────────────────

/// One location from `GET /locations`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "locationID")]
    pub location_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub devices: Vec<LocationDevice>,
}

/// Device summary embedded in a location listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(default)]
    pub device_class: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub user_defined_device_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default)]
    pub units: TemperatureUnit,
    /// T9 sensor groups.
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl LocationDevice {
    /// The user's name for the device, falling back to the vendor name and ID.
    pub fn display_name(&self) -> &str {
        if !self.user_defined_device_name.is_empty() {
            &self.user_defined_device_name
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.device_id
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<u32>,
}

// ── Shared enums ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

/// Thermostat system mode as reported in `changeableValues.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SystemMode {
    Off,
    Heat,
    Cool,
    Auto,
    #[serde(other)]
    Unsupported,
}

/// What the equipment is doing right now (`operationStatus.mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OperationMode {
    Heat,
    Cool,
    #[serde(other)]
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FanMode {
    Auto,
    On,
    Circulate,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum PriorityType {
    PickARoom,
    FollowMe,
    WholeHouse,
    #[serde(other)]
    Unsupported,
}

/// A setpoint value on the wire.
///
/// Whole numbers are written as JSON integers (`70`, not `70.0`); the
/// Fahrenheit endpoints reject fractional values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint(pub f64);

impl Serialize for Setpoint {
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.fract().abs() < f64::EPSILON && self.0.abs() < 1e9 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Setpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Setpoint)
    }
}

// ── Thermostat ──────────────────────────────────────────────────────

/// `GET /devices/thermostats/{id}` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermostat {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub user_defined_device_name: String,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default)]
    pub units: TemperatureUnit,
    #[serde(default)]
    pub indoor_temperature: f64,
    pub indoor_humidity: Option<f64>,
    #[serde(default)]
    pub allowed_modes: Vec<SystemMode>,
    #[serde(default)]
    pub min_heat_setpoint: f64,
    #[serde(default)]
    pub max_heat_setpoint: f64,
    #[serde(default)]
    pub min_cool_setpoint: f64,
    #[serde(default)]
    pub max_cool_setpoint: f64,
    pub changeable_values: ChangeableValues,
    pub operation_status: Option<OperationStatus>,
    pub settings: Option<ThermostatSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeableValues {
    pub mode: SystemMode,
    pub auto_changeover_active: Option<bool>,
    #[serde(default)]
    pub heat_setpoint: f64,
    #[serde(default)]
    pub cool_setpoint: f64,
    pub thermostat_setpoint_status: Option<String>,
    pub heat_cool_mode: Option<SystemMode>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub mode: OperationMode,
    pub fan_request: Option<bool>,
    pub circulation_fan_request: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatSettings {
    pub fan: Option<FanSettings>,
}

/// Fan block embedded in the thermostat's `settings`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanSettings {
    #[serde(default)]
    pub allowed_modes: Vec<FanMode>,
}

/// `POST /devices/thermostats/{id}` body.
///
/// Which fields are present depends on the thermostat model; absent fields
/// are left out of the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatChangeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SystemMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermostat_setpoint_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_changeover_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_setpoint: Option<Setpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cool_setpoint: Option<Setpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermostat_setpoint: Option<Setpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<TemperatureUnit>,
}

// ── Fan ─────────────────────────────────────────────────────────────

/// `GET /devices/thermostats/{id}/fan` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanState {
    #[serde(default)]
    pub allowed_modes: Vec<FanMode>,
    pub changeable_values: FanChangeableValues,
    pub fan_running: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanChangeableValues {
    pub mode: FanMode,
}

/// `POST /devices/thermostats/{id}/fan` body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanChangeRequest {
    pub mode: FanMode,
}

// ── Room priority ───────────────────────────────────────────────────

/// `GET /devices/thermostats/{id}/priority` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Priority {
    #[serde(default)]
    pub device_id: String,
    pub current_priority: CurrentPriority,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPriority {
    pub priority_type: PriorityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_rooms: Option<Vec<u32>>,
}

/// `PUT /devices/thermostats/{id}/priority` body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityChangeRequest {
    pub current_priority: CurrentPriority,
}

// ── Room sensors ────────────────────────────────────────────────────

/// `GET /devices/thermostats/{id}/group/{group}/rooms` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsResponse {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub group_id: u32,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

impl RoomsResponse {
    /// Find one sensor accessory by room and accessory ID.
    pub fn accessory(&self, room_id: u32, accessory_id: u32) -> Option<&RoomAccessory> {
        self.rooms
            .iter()
            .find(|room| room.id == room_id)?
            .accessories
            .iter()
            .find(|acc| acc.accessory_id == accessory_id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub accessories: Vec<RoomAccessory>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAccessory {
    pub accessory_id: u32,
    pub accessory_attribute: Option<AccessoryAttribute>,
    pub accessory_value: Option<AccessoryValue>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryAttribute {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub software_revision: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryValue {
    pub indoor_temperature: Option<f64>,
    pub indoor_humidity: Option<f64>,
    pub motion_det: Option<bool>,
    pub occupancy_det: Option<bool>,
    pub battery_status: Option<String>,
    pub status: Option<String>,
}

// ── Leak detector ───────────────────────────────────────────────────

/// `GET /devices/waterLeakDetectors/{id}` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakDetector {
    #[serde(rename = "deviceID", default)]
    pub device_id: String,
    #[serde(default)]
    pub water_present: bool,
    pub battery_remaining: Option<f64>,
    pub current_sensor_readings: Option<SensorReadings>,
    #[serde(default)]
    pub has_device_checked_in: bool,
    #[serde(default = "default_true")]
    pub is_alive: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReadings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

// ── Shutoff valve ───────────────────────────────────────────────────

/// `GET /devices/shutoffvalve/{id}` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutoffValve {
    #[serde(rename = "deviceID", default)]
    pub device_id: String,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    pub actuator_valve: Option<ActuatorValve>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorValve {
    #[serde(default)]
    pub valve_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValveCommand {
    Open,
    Closed,
}

/// `POST /devices/shutoffvalve/{id}` body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValveChangeRequest {
    pub state: ValveCommand,
}

// ── Errors ──────────────────────────────────────────────────────────

/// Error body shape: `{ "code": 400, "message": "..." }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub message: Option<String>,
}
