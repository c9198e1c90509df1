use resideo_api::models::{ShutoffValve, ValveChangeRequest, ValveCommand};

use crate::config::ValveOptions;
use crate::model::{Characteristic, CharacteristicValue, IntentBatch};
use crate::remote::PushRequest;

/// Water shutoff valve.
#[derive(Debug, Clone)]
pub struct ValveProfile {
    options: ValveOptions,
}

impl ValveProfile {
    pub fn new(options: ValveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValveOptions {
        &self.options
    }

    pub fn characteristics() -> Vec<Characteristic> {
        vec![
            Characteristic::ValveActive,
            Characteristic::InUse,
            Characteristic::StatusFault,
        ]
    }

    pub fn project(valve: &ShutoffValve, characteristic: Characteristic) -> Option<CharacteristicValue> {
        let open = valve
            .actuator_valve
            .as_ref()
            .is_some_and(|actuator| actuator.valve_status.eq_ignore_ascii_case("open"));
        match characteristic {
            Characteristic::ValveActive | Characteristic::InUse => {
                Some(CharacteristicValue::Bool(open))
            }
            Characteristic::StatusFault => Some(CharacteristicValue::Bool(!valve.is_alive)),
            _ => None,
        }
    }

    pub fn build_push(batch: &IntentBatch) -> Vec<PushRequest> {
        batch
            .get(Characteristic::ValveActive)
            .and_then(CharacteristicValue::as_bool)
            .map(|open| {
                PushRequest::Valve(ValveChangeRequest {
                    state: if open {
                        ValveCommand::Open
                    } else {
                        ValveCommand::Closed
                    },
                })
            })
            .into_iter()
            .collect()
    }
}
