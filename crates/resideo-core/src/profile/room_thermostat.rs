// A room sensor exposed as a thermostat.
//
// Readings come from the room's accessory; everything else is the parent
// thermostat's. A write first makes the room the only priority room, then
// sends the parent's change request.

use resideo_api::models::{CurrentPriority, PriorityChangeRequest, PriorityType};

use super::room_sensor::RoomSensorProfile;
use super::thermostat::{SYSTEM_FIELDS, ThermostatProfile};
use crate::config::ThermostatOptions;
use crate::error::CoreError;
use crate::model::{
    Characteristic, CharacteristicValue, IntentBatch, PendingIntent, RoomThermostatState,
};
use crate::remote::PushRequest;

#[derive(Debug, Clone)]
pub struct RoomThermostatProfile {
    parent: ThermostatProfile,
    room_id: u32,
}

impl RoomThermostatProfile {
    pub fn new(thermostat_model: &str, options: ThermostatOptions, room_id: u32) -> Self {
        Self {
            parent: ThermostatProfile::new(thermostat_model, options),
            room_id,
        }
    }

    pub fn options(&self) -> &ThermostatOptions {
        self.parent.options()
    }

    pub fn characteristics(&self, state: Option<&RoomThermostatState>) -> Vec<Characteristic> {
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
        let has_humidity = state
            .and_then(|s| s.accessory.accessory_value.as_ref())
            .is_some_and(|v| v.indoor_humidity.is_some());
        if has_humidity && !self.options().hide_humidity {
            list.push(Characteristic::CurrentRelativeHumidity);
        }
        list
    }

    pub fn is_writable(characteristic: Characteristic) -> bool {
        SYSTEM_FIELDS.contains(&characteristic)
    }

    pub fn project(
        &self,
        state: &RoomThermostatState,
        pending: &PendingIntent,
        characteristic: Characteristic,
    ) -> Option<CharacteristicValue> {
        match characteristic {
            Characteristic::CurrentTemperature | Characteristic::CurrentRelativeHumidity => {
                if characteristic == Characteristic::CurrentRelativeHumidity
                    && self.options().hide_humidity
                {
                    return None;
                }
                RoomSensorProfile::new(state.thermostat.thermostat.units)
                    .project(&state.accessory, characteristic)
            }
            Characteristic::StatusFault => {
                let sensor_fault = RoomSensorProfile::new(state.thermostat.thermostat.units)
                    .project(&state.accessory, characteristic)
                    .as_ref()
                    .and_then(CharacteristicValue::as_bool)
                    .unwrap_or(false);
                Some(CharacteristicValue::Bool(
                    sensor_fault || !state.thermostat.thermostat.is_alive,
                ))
            }
            _ => self.parent.project(&state.thermostat, pending, characteristic),
        }
    }

    pub fn validate(
        &self,
        state: Option<&RoomThermostatState>,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), CoreError> {
        match state {
            Some(state) => self.parent.validate(&state.thermostat, characteristic, value),
            None => self.parent.validate_without_state(characteristic, value),
        }
    }

    pub fn build_push(&self, state: &RoomThermostatState, batch: &IntentBatch) -> Vec<PushRequest> {
        if !SYSTEM_FIELDS.iter().any(|c| batch.contains(*c)) {
            return Vec::new();
        }
        let mut requests = Vec::new();
        if !self.is_selected(state) {
            requests.push(PushRequest::Priority(PriorityChangeRequest {
                current_priority: CurrentPriority {
                    priority_type: PriorityType::PickARoom,
                    selected_rooms: Some(vec![self.room_id]),
                },
            }));
        }
        requests.push(PushRequest::Thermostat(
            self.parent.system_request(&state.thermostat, batch),
        ));
        requests
    }

    /// Whether the parent already prioritizes this room and only this room.
    fn is_selected(&self, state: &RoomThermostatState) -> bool {
        let Some(priority) = state.thermostat.priority.as_ref() else {
            return false;
        };
        let current = &priority.current_priority;
        current.priority_type == PriorityType::PickARoom
            && current
                .selected_rooms
                .as_deref()
                .is_some_and(|rooms| !rooms.is_empty() && rooms.iter().all(|r| *r == self.room_id))
    }
}
