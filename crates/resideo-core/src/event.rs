// ── Device events ──
//
// Broadcast by the reconciliation loops so consumers learn about pushes
// that failed after `set()` already returned.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Characteristic;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceEvent {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: DeviceEventKind,
}

impl DeviceEvent {
    pub fn new(device_id: impl Into<String>, kind: DeviceEventKind) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEventKind {
    /// A pull replaced the remote state.
    Updated,
    /// The vendor accepted a push covering these fields.
    PushSucceeded { fields: Vec<Characteristic> },
    /// A push was given up; the fields revert on the next pull.
    PushAbandoned {
        fields: Vec<Characteristic>,
        error: String,
    },
    /// A pull exhausted its retries or failed fatally.
    PullFailed { error: String },
    /// The device left the fleet.
    Removed,
}
