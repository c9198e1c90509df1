// resideo-core: Per-device reconciliation between local intent and the Resideo cloud.

pub mod bus;
pub mod cache;
pub mod config;
pub mod convert;
pub mod device;
pub mod error;
pub mod event;
pub mod fleet;
pub mod model;
pub mod profile;
pub mod reconcile;
pub mod remote;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{ReconciliationState, Snapshot, StatusCache};
pub use config::{
    DeviceLogging, DeviceSettings, FleetConfig, LeakSensorOptions, PushFailurePolicy,
    ThermostatOptions, ValveOptions,
};
pub use device::DeviceController;
pub use error::CoreError;
pub use event::{DeviceEvent, DeviceEventKind};
pub use fleet::{DiscoveredDevice, DiscoveryReport, FleetCoordinator, discover_devices};
pub use profile::DeviceProfile;
pub use reconcile::RetryPolicy;
pub use remote::{PushRequest, RemoteDevice, ResideoRemote};
pub use stream::SnapshotStream;

pub use model::{
    Characteristic, CharacteristicValue, DeviceClass, DeviceIdentity, HeatingCoolingState,
    PendingIntent, RemoteState, RoomRef, RoomThermostatState, TargetFanState, ThermostatState,
};
