// ── Remote device access ──
//
// The seam between the reconciliation loop and the vendor API. One pull
// returns a complete `RemoteState`; one push sends one request. Neither
// retries; the loop owns all retry and backoff decisions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use resideo_api::models::{
    FanChangeRequest, PriorityChangeRequest, RoomAccessory, RoomsResponse,
    ThermostatChangeRequest, ValveChangeRequest,
};
use resideo_api::{Error as ApiError, ResideoClient};
use tokio::time::Instant;
use tracing::debug;

use crate::model::{DeviceClass, DeviceIdentity, RemoteState, RoomThermostatState, ThermostatState};
use crate::profile::DeviceProfile;

/// One vendor write.
#[derive(Debug, Clone, PartialEq)]
pub enum PushRequest {
    Thermostat(ThermostatChangeRequest),
    Fan(FanChangeRequest),
    Priority(PriorityChangeRequest),
    Valve(ValveChangeRequest),
}

impl PushRequest {
    /// Short label for logs.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Thermostat(_) => "thermostat",
            Self::Fan(_) => "fan",
            Self::Priority(_) => "priority",
            Self::Valve(_) => "valve",
        }
    }
}

/// Stateless request/response access to one device's vendor resources.
#[async_trait]
pub trait RemoteDevice: Send + Sync {
    /// Fetch a complete snapshot. Partial responses are errors.
    async fn pull(
        &self,
        identity: &DeviceIdentity,
        profile: &DeviceProfile,
    ) -> Result<RemoteState, ApiError>;

    async fn push(&self, identity: &DeviceIdentity, request: &PushRequest) -> Result<(), ApiError>;
}

// ── HTTP implementation ──────────────────────────────────────────────

type RoomsKey = (String, u32);

/// `RemoteDevice` backed by the Resideo cloud API.
///
/// Room sensor and room thermostat pulls share one rooms listing per
/// thermostat group; the listing is cached for `room_cache_ttl`.
pub struct ResideoRemote {
    client: ResideoClient,
    room_cache_ttl: Duration,
    rooms: DashMap<RoomsKey, (Instant, Arc<RoomsResponse>)>,
}

impl ResideoRemote {
    pub fn new(client: ResideoClient, room_cache_ttl: Duration) -> Self {
        Self {
            client,
            room_cache_ttl,
            rooms: DashMap::new(),
        }
    }

    pub fn client(&self) -> &ResideoClient {
        &self.client
    }

    async fn rooms(
        &self,
        thermostat_id: &str,
        group_id: u32,
        location_id: u64,
    ) -> Result<Arc<RoomsResponse>, ApiError> {
        let key = (thermostat_id.to_owned(), group_id);
        if let Some(entry) = self.rooms.get(&key) {
            let (fetched, rooms) = entry.value();
            if fetched.elapsed() < self.room_cache_ttl {
                return Ok(Arc::clone(rooms));
            }
        }

        let rooms = Arc::new(
            self.client
                .list_rooms(thermostat_id, group_id, location_id)
                .await?,
        );
        self.rooms.insert(key, (Instant::now(), Arc::clone(&rooms)));
        Ok(rooms)
    }

    /// The accessory a room device reads from, out of the shared listing.
    async fn room_accessory(&self, identity: &DeviceIdentity) -> Result<RoomAccessory, ApiError> {
        let Some(room) = identity.room.as_ref() else {
            return Err(ApiError::NotFound {
                message: format!("{} has no room reference", identity.device_id),
            });
        };
        let rooms = self
            .rooms(&room.thermostat_id, room.group_id, identity.location_id)
            .await?;
        rooms
            .accessory(room.room_id, room.accessory_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                message: format!(
                    "accessory {} missing from room {}",
                    room.accessory_id, room.room_id
                ),
            })
    }

    async fn pull_thermostat(
        &self,
        identity: &DeviceIdentity,
        profile: &DeviceProfile,
    ) -> Result<ThermostatState, ApiError> {
        let id = identity.device_id.as_str();
        let location = identity.location_id;
        let thermostat = self.client.get_thermostat(id, location).await?;

        let has_fan = thermostat
            .settings
            .as_ref()
            .is_some_and(|s| s.fan.is_some());
        let fan = if profile.wants_fan() && has_fan {
            Some(self.client.get_fan(id, location).await?)
        } else {
            None
        };
        let priority = if profile.wants_priority() {
            Some(self.client.get_priority(id, location).await?)
        } else {
            None
        };

        Ok(ThermostatState {
            thermostat,
            fan,
            priority,
        })
    }
}

#[async_trait]
impl RemoteDevice for ResideoRemote {
    async fn pull(
        &self,
        identity: &DeviceIdentity,
        profile: &DeviceProfile,
    ) -> Result<RemoteState, ApiError> {
        let id = identity.device_id.as_str();
        let location = identity.location_id;
        match identity.class {
            DeviceClass::Thermostat => self
                .pull_thermostat(identity, profile)
                .await
                .map(RemoteState::Thermostat),
            DeviceClass::LeakSensor => self
                .client
                .get_leak_detector(id, location)
                .await
                .map(RemoteState::LeakSensor),
            DeviceClass::Valve => self
                .client
                .get_valve(id, location)
                .await
                .map(RemoteState::Valve),
            DeviceClass::RoomSensor => self
                .room_accessory(identity)
                .await
                .map(RemoteState::RoomSensor),
            DeviceClass::RoomThermostat => {
                let accessory = self.room_accessory(identity).await?;
                let parent = identity.vendor_id();
                let thermostat = self.client.get_thermostat(parent, location).await?;
                let priority = self.client.get_priority(parent, location).await?;
                Ok(RemoteState::RoomThermostat(RoomThermostatState {
                    thermostat: ThermostatState {
                        thermostat,
                        fan: None,
                        priority: Some(priority),
                    },
                    accessory,
                }))
            }
        }
    }

    async fn push(&self, identity: &DeviceIdentity, request: &PushRequest) -> Result<(), ApiError> {
        let id = identity.vendor_id();
        let location = identity.location_id;
        debug!(device = %identity.device_id, resource = request.resource(), "pushing");
        match request {
            PushRequest::Thermostat(body) => self.client.set_thermostat(id, location, body).await,
            PushRequest::Fan(body) => self.client.set_fan(id, location, body).await,
            PushRequest::Priority(body) => self.client.set_priority(id, location, body).await,
            PushRequest::Valve(body) => self.client.set_valve(id, location, body).await,
        }
    }
}
