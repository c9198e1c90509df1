// ── Domain model ──
//
// Device identity, characteristics, remote snapshots and pending intent.

mod characteristic;
mod identity;
mod intent;
mod state;

pub use characteristic::{Characteristic, CharacteristicValue, HeatingCoolingState, TargetFanState};
pub use identity::{DeviceClass, DeviceIdentity, RoomRef};
pub use intent::{IntentBatch, PendingIntent};
pub use state::{RemoteState, RoomThermostatState, ThermostatState};
