// Thermostat projection and payload rules.
//
// Sub-models disagree about which fields a change request may carry:
// `Unknown` takes a single `thermostatSetpoint`, `Round` rejects
// `thermostatSetpointStatus`, and Round/D6 need `autoChangeoverActive`
// to enter Auto.

use std::collections::BTreeSet;

use resideo_api::models::{
    CurrentPriority, FanChangeRequest, FanMode, OperationMode, PriorityChangeRequest, PriorityType,
    Setpoint, SystemMode, ThermostatChangeRequest,
};

use crate::config::ThermostatOptions;
use crate::convert::{to_celsius, to_device_units};
use crate::error::CoreError;
use crate::model::{
    Characteristic, CharacteristicValue, HeatingCoolingState, IntentBatch, PendingIntent,
    TargetFanState, ThermostatState,
};
use crate::remote::PushRequest;

pub(super) const SYSTEM_FIELDS: [Characteristic; 4] = [
    Characteristic::TargetTemperature,
    Characteristic::HeatingThresholdTemperature,
    Characteristic::CoolingThresholdTemperature,
    Characteristic::TargetHeatingCoolingState,
];

#[derive(Debug, Clone)]
pub struct ThermostatProfile {
    model: String,
    options: ThermostatOptions,
}

impl ThermostatProfile {
    pub fn new(model: &str, options: ThermostatOptions) -> Self {
        Self {
            model: model.to_owned(),
            options,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn options(&self) -> &ThermostatOptions {
        &self.options
    }

    fn is_unknown_model(&self) -> bool {
        self.model == "Unknown"
    }

    fn is_round(&self) -> bool {
        self.model == "Round"
    }

    /// Room priority is a T9/T10 feature and must be switched on.
    pub fn supports_room_priority(&self) -> bool {
        self.options.room_priority && (self.model.starts_with("T9") || self.model.starts_with("T10"))
    }

    pub fn characteristics(&self, state: Option<&ThermostatState>) -> Vec<Characteristic> {
        let mut list = vec![
            Characteristic::CurrentTemperature,
            Characteristic::TargetTemperature,
            Characteristic::HeatingThresholdTemperature,
            Characteristic::CoolingThresholdTemperature,
            Characteristic::TargetHeatingCoolingState,
            Characteristic::CurrentHeatingCoolingState,
            Characteristic::TemperatureDisplayUnits,
            Characteristic::StatusFault,
        ];
        let Some(state) = state else {
            return list;
        };
        if !self.options.hide_humidity && state.thermostat.indoor_humidity.is_some() {
            list.push(Characteristic::CurrentRelativeHumidity);
        }
        if !self.options.hide_fan && state.fan.is_some() {
            list.push(Characteristic::TargetFanState);
            list.push(Characteristic::FanActive);
        }
        if self.supports_room_priority() && state.priority.is_some() {
            list.push(Characteristic::RoomPriority);
        }
        list
    }

    pub fn is_writable(&self, characteristic: Characteristic) -> bool {
        matches!(
            characteristic,
            Characteristic::TargetTemperature
                | Characteristic::HeatingThresholdTemperature
                | Characteristic::CoolingThresholdTemperature
                | Characteristic::TargetHeatingCoolingState
                | Characteristic::TargetFanState
                | Characteristic::FanActive
                | Characteristic::RoomPriority
        )
    }

    // ── Projection ───────────────────────────────────────────────────

    pub fn project(
        &self,
        state: &ThermostatState,
        pending: &PendingIntent,
        characteristic: Characteristic,
    ) -> Option<CharacteristicValue> {
        let t = &state.thermostat;
        let values = &t.changeable_values;
        match characteristic {
            Characteristic::CurrentTemperature => Some(CharacteristicValue::Celsius(to_celsius(
                t.indoor_temperature,
                t.units,
            ))),
            Characteristic::CurrentRelativeHumidity => {
                if self.options.hide_humidity {
                    None
                } else {
                    t.indoor_humidity.map(CharacteristicValue::Percent)
                }
            }
            Characteristic::TargetHeatingCoolingState => Some(CharacteristicValue::HeatingCooling(
                heating_cooling(values.mode),
            )),
            Characteristic::CurrentHeatingCoolingState => {
                let current = match t.operation_status.as_ref().map(|s| s.mode) {
                    Some(OperationMode::Heat) => HeatingCoolingState::Heat,
                    Some(OperationMode::Cool) => HeatingCoolingState::Cool,
                    Some(OperationMode::Idle) | None => HeatingCoolingState::Off,
                };
                Some(CharacteristicValue::HeatingCooling(current))
            }
            Characteristic::TargetTemperature => {
                let mode = pending
                    .get(Characteristic::TargetHeatingCoolingState)
                    .and_then(CharacteristicValue::as_heating_cooling)
                    .unwrap_or_else(|| heating_cooling(values.mode));
                let (threshold, raw) = if mode == HeatingCoolingState::Heat {
                    (Characteristic::HeatingThresholdTemperature, values.heat_setpoint)
                } else {
                    (Characteristic::CoolingThresholdTemperature, values.cool_setpoint)
                };
                let celsius = pending
                    .get(threshold)
                    .and_then(CharacteristicValue::as_celsius)
                    .unwrap_or_else(|| to_celsius(raw, t.units));
                Some(CharacteristicValue::Celsius(celsius))
            }
            Characteristic::HeatingThresholdTemperature => Some(CharacteristicValue::Celsius(
                to_celsius(values.heat_setpoint, t.units),
            )),
            Characteristic::CoolingThresholdTemperature => Some(CharacteristicValue::Celsius(
                to_celsius(values.cool_setpoint, t.units),
            )),
            Characteristic::TemperatureDisplayUnits => Some(CharacteristicValue::Units(t.units)),
            Characteristic::TargetFanState | Characteristic::FanActive => {
                if self.options.hide_fan {
                    return None;
                }
                let (target, active) = fan_state(state.fan.as_ref()?.changeable_values.mode)?;
                Some(if characteristic == Characteristic::TargetFanState {
                    CharacteristicValue::FanTarget(target)
                } else {
                    CharacteristicValue::Bool(active)
                })
            }
            Characteristic::RoomPriority => {
                if !self.supports_room_priority() {
                    return None;
                }
                let rooms = state
                    .priority
                    .as_ref()?
                    .current_priority
                    .selected_rooms
                    .iter()
                    .flatten()
                    .copied()
                    .collect();
                Some(CharacteristicValue::Rooms(rooms))
            }
            Characteristic::StatusFault => Some(CharacteristicValue::Bool(!t.is_alive)),
            _ => None,
        }
    }

    // ── Validation ───────────────────────────────────────────────────

    pub fn validate(
        &self,
        state: &ThermostatState,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), CoreError> {
        let t = &state.thermostat;
        match characteristic {
            Characteristic::TargetTemperature
            | Characteristic::HeatingThresholdTemperature
            | Characteristic::CoolingThresholdTemperature => {
                let Some(celsius) = value.as_celsius() else {
                    return Ok(());
                };
                // Devices that do not report limits accept anything.
                if t.min_heat_setpoint.abs() < f64::EPSILON && t.max_cool_setpoint.abs() < f64::EPSILON {
                    return Ok(());
                }
                let min = to_celsius(t.min_heat_setpoint, t.units);
                let max = to_celsius(t.max_cool_setpoint, t.units);
                if celsius < min || celsius > max {
                    return Err(CoreError::InvalidValue {
                        characteristic,
                        message: format!("{celsius} °C is outside {min}..={max} °C"),
                    });
                }
                Ok(())
            }
            Characteristic::TargetHeatingCoolingState => {
                let Some(mode) = value.as_heating_cooling() else {
                    return Ok(());
                };
                if self.allowed_modes(state).contains(&mode) {
                    Ok(())
                } else {
                    Err(CoreError::InvalidValue {
                        characteristic,
                        message: format!("{} does not support {mode}", self.model),
                    })
                }
            }
            _ => self.validate_without_state(characteristic, value),
        }
    }

    /// Checks that need no vendor data.
    pub fn validate_without_state(
        &self,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), CoreError> {
        if characteristic == Characteristic::RoomPriority
            && self.options.priority_type == PriorityType::PickARoom
            && value.as_rooms().is_some_and(BTreeSet::is_empty)
        {
            return Err(CoreError::InvalidValue {
                characteristic,
                message: "PickARoom needs at least one room".into(),
            });
        }
        Ok(())
    }

    /// Target modes the device accepts, plus Auto when `show_auto` is set.
    pub fn allowed_modes(&self, state: &ThermostatState) -> Vec<HeatingCoolingState> {
        let mut modes: Vec<HeatingCoolingState> = state
            .thermostat
            .allowed_modes
            .iter()
            .filter(|m| **m != SystemMode::Unsupported)
            .map(|m| heating_cooling(*m))
            .collect();
        if self.options.show_auto && !modes.contains(&HeatingCoolingState::Auto) {
            modes.push(HeatingCoolingState::Auto);
        }
        modes
    }

    // ── Payloads ─────────────────────────────────────────────────────

    pub fn build_push(&self, state: &ThermostatState, batch: &IntentBatch) -> Vec<PushRequest> {
        let mut requests = Vec::new();

        if SYSTEM_FIELDS.iter().any(|c| batch.contains(*c)) {
            requests.push(PushRequest::Thermostat(self.system_request(state, batch)));
        }

        let fan_touched = batch.contains(Characteristic::TargetFanState)
            || batch.contains(Characteristic::FanActive);
        if let Some(fan) = state.fan.as_ref().filter(|_| fan_touched && !self.options.hide_fan) {
            let (current_target, current_active) =
                fan_state(fan.changeable_values.mode).unwrap_or((TargetFanState::Auto, false));
            let target = batch
                .get(Characteristic::TargetFanState)
                .and_then(CharacteristicValue::as_fan_target)
                .unwrap_or(current_target);
            let active = batch
                .get(Characteristic::FanActive)
                .and_then(CharacteristicValue::as_bool)
                .unwrap_or(current_active);
            requests.push(PushRequest::Fan(FanChangeRequest {
                mode: fan_mode(target, active),
            }));
        }

        let rooms = batch
            .get(Characteristic::RoomPriority)
            .and_then(CharacteristicValue::as_rooms);
        if let (Some(rooms), Some(priority), true) =
            (rooms, &state.priority, self.supports_room_priority())
        {
            let current: BTreeSet<u32> = priority
                .current_priority
                .selected_rooms
                .iter()
                .flatten()
                .copied()
                .collect();
            let priority_type = self.options.priority_type;
            if current != *rooms || priority.current_priority.priority_type != priority_type {
                let selected_rooms = (priority_type == PriorityType::PickARoom)
                    .then(|| rooms.iter().copied().collect());
                requests.push(PushRequest::Priority(PriorityChangeRequest {
                    current_priority: CurrentPriority {
                        priority_type,
                        selected_rooms,
                    },
                }));
            }
        }

        requests
    }

    pub(super) fn system_request(
        &self,
        state: &ThermostatState,
        batch: &IntentBatch,
    ) -> ThermostatChangeRequest {
        let t = &state.thermostat;
        let values = &t.changeable_values;

        let mode = batch
            .get(Characteristic::TargetHeatingCoolingState)
            .and_then(CharacteristicValue::as_heating_cooling)
            .map_or(values.mode, system_mode);

        let pending = |characteristic| {
            batch
                .get(characteristic)
                .and_then(CharacteristicValue::as_celsius)
                .map(|celsius| to_device_units(celsius, t.units))
        };
        let target = pending(Characteristic::TargetTemperature);
        let heat_threshold = pending(Characteristic::HeatingThresholdTemperature);
        let cool_threshold = pending(Characteristic::CoolingThresholdTemperature);

        let (heat, cool) = match mode {
            SystemMode::Heat => (
                target.or(heat_threshold).unwrap_or(values.heat_setpoint),
                cool_threshold.unwrap_or(values.cool_setpoint),
            ),
            SystemMode::Cool => (
                heat_threshold.unwrap_or(values.heat_setpoint),
                target.or(cool_threshold).unwrap_or(values.cool_setpoint),
            ),
            SystemMode::Auto | SystemMode::Off | SystemMode::Unsupported => (
                heat_threshold.unwrap_or(values.heat_setpoint),
                cool_threshold.unwrap_or(values.cool_setpoint),
            ),
        };

        let mut request = ThermostatChangeRequest {
            mode: (mode != SystemMode::Unsupported).then_some(mode),
            ..Default::default()
        };

        if self.is_unknown_model() {
            request.mode = None;
            let setpoint = if mode == SystemMode::Cool { cool } else { heat };
            request.thermostat_setpoint = Some(Setpoint(setpoint));
            request.unit = Some(t.units);
            return request;
        }

        if !self.is_round() {
            request.thermostat_setpoint_status = Some(self.options.setpoint_status.clone());
        }
        request.auto_changeover_active =
            if (self.is_round() || self.model == "D6") && mode == SystemMode::Auto {
                Some(true)
            } else {
                values.auto_changeover_active
            };
        request.heat_setpoint = Some(Setpoint(heat));
        request.cool_setpoint = Some(Setpoint(cool));
        request
    }
}

fn heating_cooling(mode: SystemMode) -> HeatingCoolingState {
    match mode {
        SystemMode::Heat => HeatingCoolingState::Heat,
        SystemMode::Cool => HeatingCoolingState::Cool,
        SystemMode::Auto => HeatingCoolingState::Auto,
        SystemMode::Off | SystemMode::Unsupported => HeatingCoolingState::Off,
    }
}

fn system_mode(state: HeatingCoolingState) -> SystemMode {
    match state {
        HeatingCoolingState::Off => SystemMode::Off,
        HeatingCoolingState::Heat => SystemMode::Heat,
        HeatingCoolingState::Cool => SystemMode::Cool,
        HeatingCoolingState::Auto => SystemMode::Auto,
    }
}

fn fan_state(mode: FanMode) -> Option<(TargetFanState, bool)> {
    match mode {
        FanMode::Auto => Some((TargetFanState::Auto, false)),
        FanMode::On => Some((TargetFanState::Manual, true)),
        FanMode::Circulate => Some((TargetFanState::Manual, false)),
        FanMode::Unsupported => None,
    }
}

fn fan_mode(target: TargetFanState, active: bool) -> FanMode {
    match (target, active) {
        (TargetFanState::Auto, _) => FanMode::Auto,
        (TargetFanState::Manual, true) => FanMode::On,
        (TargetFanState::Manual, false) => FanMode::Circulate,
    }
}
