// ── Fleet coordinator ──
//
// Owns every DeviceController. Discovery walks the locations listing,
// starts a controller per supported device and tears down controllers
// whose device vanished or went offline. Room devices of a thermostat
// whose rooms failed to list are left running. The shared access token is
// refreshed on its own timer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use resideo_api::models::LocationDevice;
use resideo_api::{ResideoClient, TokenSource};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FleetConfig;
use crate::device::DeviceController;
use crate::error::CoreError;
use crate::event::DeviceEvent;
use crate::model::{DeviceClass, DeviceIdentity, RoomRef};
use crate::remote::{RemoteDevice, ResideoRemote};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Prefix of the accessory type reported for T9 wireless room sensors.
const ROOM_SENSOR_TYPE: &str = "IndoorAirSensor";

/// One device found by a discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    pub identity: DeviceIdentity,
    pub location_name: String,
    pub alive: bool,
    pub hidden: bool,
}

impl DiscoveredDevice {
    /// Alive and not hidden by configuration.
    pub fn is_managed(&self) -> bool {
        self.alive && !self.hidden
    }
}

/// What a discovery pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Cheaply cloneable handle to the whole bridge.
#[derive(Clone)]
pub struct FleetCoordinator {
    inner: Arc<FleetInner>,
}

struct FleetInner {
    config: FleetConfig,
    client: ResideoClient,
    remote: Arc<dyn RemoteDevice>,
    tokens: Arc<dyn TokenSource>,
    devices: DashMap<String, DeviceController>,
    events: broadcast::Sender<DeviceEvent>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl FleetCoordinator {
    /// Build a coordinator that talks to the vendor through `client`.
    /// Nothing runs until [`start()`](Self::start).
    pub fn new(config: FleetConfig, client: ResideoClient) -> Self {
        let remote = Arc::new(ResideoRemote::new(client.clone(), config.room_cache_ttl));
        let tokens = Arc::clone(client.tokens());
        Self::with_remote(config, client, remote, tokens)
    }

    /// Like [`new`](Self::new) with an explicit device transport.
    pub fn with_remote(
        config: FleetConfig,
        client: ResideoClient,
        remote: Arc<dyn RemoteDevice>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(FleetInner {
                config,
                client,
                remote,
                tokens,
                devices: DashMap::new(),
                events,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Run the first discovery pass and start the background timers.
    pub async fn start(&self) -> Result<DiscoveryReport, CoreError> {
        let report = self.discover().await?;

        let mut handles = self.inner.task_handles.lock().await;
        let config = &self.inner.config;

        if !config.discovery_interval.is_zero() {
            let fleet = self.clone();
            handles.push(tokio::spawn(discovery_task(
                fleet,
                config.discovery_interval,
                self.inner.cancel.clone(),
            )));
        }

        if !config.token_refresh_interval.is_zero() {
            let fleet = self.clone();
            handles.push(tokio::spawn(token_refresh_task(
                fleet,
                config.token_refresh_interval,
                self.inner.cancel.clone(),
            )));
        }

        info!(devices = report.total, "fleet started");
        Ok(report)
    }

    /// Stop the timers and every device loop, then wait for them.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let controllers: Vec<DeviceController> =
            self.inner.devices.iter().map(|e| e.value().clone()).collect();
        for controller in controllers {
            controller.shutdown().await;
        }
        self.inner.devices.clear();
        debug!("fleet stopped");
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Reconcile the set of running controllers with the vendor listing.
    pub async fn discover(&self) -> Result<DiscoveryReport, CoreError> {
        let listing = walk(&self.inner.client, &self.inner.config).await?;
        let wanted: HashMap<String, DeviceIdentity> = listing
            .devices
            .into_iter()
            .filter(DiscoveredDevice::is_managed)
            .map(|d| (d.identity.key(), d.identity))
            .collect();

        let stale: Vec<String> = self
            .inner
            .devices
            .iter()
            .filter(|e| !wanted.contains_key(e.key()))
            .filter(|e| {
                // Kept until their thermostat's rooms list again.
                !e.value()
                    .identity()
                    .room
                    .as_ref()
                    .is_some_and(|room| listing.unlisted.contains(&room.thermostat_id))
            })
            .map(|e| e.key().clone())
            .collect();

        let mut report = DiscoveryReport::default();
        for key in stale {
            if let Some((_, controller)) = self.inner.devices.remove(&key) {
                info!(device = %controller.identity(), "device removed");
                controller.remove().await;
                report.removed += 1;
            }
        }

        for (key, identity) in wanted {
            if self.inner.devices.contains_key(&key) || self.inner.cancel.is_cancelled() {
                continue;
            }
            let settings = self.inner.config.settings_for(settings_key(&identity)).clone();
            info!(device = %identity, "device added");
            let controller = DeviceController::new(
                identity,
                settings,
                Arc::clone(&self.inner.remote),
                Arc::clone(&self.inner.tokens),
                self.inner.events.clone(),
                self.inner.cancel.child_token(),
            );
            controller.start().await;
            self.inner.devices.insert(key, controller);
            report.added += 1;
        }

        report.total = self.inner.devices.len();
        debug!(
            added = report.added,
            removed = report.removed,
            total = report.total,
            "discovery complete"
        );
        Ok(report)
    }

    /// Ask the token source for a fresh access token now.
    pub async fn refresh_token(&self) -> Result<(), CoreError> {
        self.inner.tokens.refresh().await?;
        debug!("access token refreshed");
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Look a device up by vendor device ID.
    pub fn device(&self, device_id: &str) -> Option<DeviceController> {
        self.inner
            .devices
            .iter()
            .find(|e| e.value().identity().device_id == device_id)
            .map(|e| e.value().clone())
    }

    /// Every running controller, sorted by name.
    pub fn devices(&self) -> Vec<DeviceController> {
        let mut list: Vec<DeviceController> =
            self.inner.devices.iter().map(|e| e.value().clone()).collect();
        list.sort_by(|a, b| a.identity().name.cmp(&b.identity().name));
        list
    }

    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }
}

// ── Discovery listing ────────────────────────────────────────────────

/// One discovery walk. `unlisted` holds the thermostats whose rooms could
/// not be listed; their room devices are unknown rather than gone.
struct Listing {
    devices: Vec<DiscoveredDevice>,
    unlisted: HashSet<String>,
}

/// Walk every location and build identities for the supported devices,
/// including T9 room sensors. Offline and hidden devices are reported
/// but flagged.
pub async fn discover_devices(
    client: &ResideoClient,
    config: &FleetConfig,
) -> Result<Vec<DiscoveredDevice>, CoreError> {
    walk(client, config).await.map(|listing| listing.devices)
}

async fn walk(client: &ResideoClient, config: &FleetConfig) -> Result<Listing, CoreError> {
    let locations = client.list_locations().await?;
    let mut listing = Listing {
        devices: Vec::new(),
        unlisted: HashSet::new(),
    };

    for location in &locations {
        for device in &location.devices {
            let Some(class) = DeviceClass::from_vendor(&device.device_class) else {
                info!(
                    device = %device.device_id,
                    class = %device.device_class,
                    "unsupported device class, skipping"
                );
                continue;
            };

            let identity = DeviceIdentity::new(
                device.device_id.clone(),
                class,
                location.location_id,
                device.display_name(),
                device.device_model.clone(),
            );
            let settings = config.settings_for(&device.device_id);
            listing.devices.push(DiscoveredDevice {
                identity,
                location_name: location.name.clone(),
                alive: device.is_alive,
                hidden: settings.hidden,
            });

            let has_room_sensors = device.device_model.starts_with("T9")
                || device.device_model.starts_with("T10");
            let options = &settings.thermostat;
            if class != DeviceClass::Thermostat
                || !has_room_sensors
                || !device.is_alive
                || settings.hidden
                || (options.hide_room_sensors && !options.room_thermostats)
            {
                continue;
            }

            let sensors = match room_sensors(client, location.location_id, device).await {
                Ok(sensors) => sensors,
                Err(e) => {
                    warn!(device = %device.device_id, error = %e, "room sensor listing failed");
                    listing.unlisted.insert(device.device_id.clone());
                    continue;
                }
            };
            for (name, model, room) in sensors {
                let mut identities = Vec::with_capacity(2);
                if options.room_thermostats {
                    identities.push(DeviceIdentity::room_thermostat(
                        location.location_id,
                        name.clone(),
                        device.device_model.clone(),
                        room.clone(),
                    ));
                }
                if !options.hide_room_sensors {
                    identities.push(DeviceIdentity::room_sensor(
                        location.location_id,
                        name,
                        model,
                        room,
                    ));
                }
                listing.devices.extend(identities.into_iter().map(|identity| {
                    let hidden = config.settings_for(&identity.device_id).hidden;
                    DiscoveredDevice {
                        identity,
                        location_name: location.name.clone(),
                        alive: true,
                        hidden,
                    }
                }));
            }
        }
    }

    Ok(listing)
}

/// Every IndoorAirSensor accessory on `thermostat`: display name, model
/// and where it lives.
async fn room_sensors(
    client: &ResideoClient,
    location_id: u64,
    thermostat: &LocationDevice,
) -> Result<Vec<(String, String, RoomRef)>, CoreError> {
    let mut sensors = Vec::new();
    for group in &thermostat.groups {
        let rooms = client
            .list_rooms(&thermostat.device_id, group.id, location_id)
            .await?;
        for room in &rooms.rooms {
            for accessory in &room.accessories {
                let Some(attribute) = accessory.accessory_attribute.as_ref() else {
                    continue;
                };
                if !attribute.kind.starts_with(ROOM_SENSOR_TYPE) {
                    continue;
                }
                let name = if attribute.name.is_empty() {
                    room.name.clone()
                } else {
                    attribute.name.clone()
                };
                sensors.push((
                    name,
                    attribute.model.clone(),
                    RoomRef {
                        thermostat_id: thermostat.device_id.clone(),
                        group_id: group.id,
                        room_id: room.id,
                        accessory_id: accessory.accessory_id,
                        units: thermostat.units,
                    },
                ));
            }
        }
    }
    Ok(sensors)
}

/// Room thermostats run with their parent's settings.
fn settings_key(identity: &DeviceIdentity) -> &str {
    match identity.class {
        DeviceClass::RoomThermostat => identity.vendor_id(),
        _ => &identity.device_id,
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn discovery_task(fleet: FleetCoordinator, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await; // start() already ran the first pass

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = fleet.discover().await {
                    warn!(error = %e, "periodic discovery failed");
                }
            }
        }
    }
}

async fn token_refresh_task(fleet: FleetCoordinator, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = fleet.refresh_token().await {
                    warn!(error = %e, "scheduled token refresh failed");
                }
            }
        }
    }
}
