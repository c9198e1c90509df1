// ── Device controller ──
//
// The characteristic-facing handle for one physical device. `get` and
// `set` only touch the StatusCache and ChangeBus; all I/O happens in the
// device's reconciliation loop, started by `start()`.

use std::sync::Arc;

use resideo_api::TokenSource;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::ChangeBus;
use crate::cache::{ReconciliationState, Snapshot, StatusCache};
use crate::config::DeviceSettings;
use crate::error::CoreError;
use crate::event::{DeviceEvent, DeviceEventKind};
use crate::model::{Characteristic, CharacteristicValue, DeviceIdentity};
use crate::profile::DeviceProfile;
use crate::reconcile::ReconciliationLoop;
use crate::remote::RemoteDevice;
use crate::stream::SnapshotStream;

/// Cheaply cloneable handle to one device.
#[derive(Clone)]
pub struct DeviceController {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    identity: Arc<DeviceIdentity>,
    profile: Arc<DeviceProfile>,
    settings: DeviceSettings,
    cache: Arc<StatusCache>,
    bus: Arc<ChangeBus>,
    remote: Arc<dyn RemoteDevice>,
    tokens: Arc<dyn TokenSource>,
    events: broadcast::Sender<DeviceEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceController {
    /// Build a controller. Nothing runs until [`start()`](Self::start).
    ///
    /// `cancel` is usually a child of the fleet's token so a fleet shutdown
    /// stops every device.
    pub fn new(
        identity: DeviceIdentity,
        settings: DeviceSettings,
        remote: Arc<dyn RemoteDevice>,
        tokens: Arc<dyn TokenSource>,
        events: broadcast::Sender<DeviceEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let profile = Arc::new(DeviceProfile::for_device(&identity, &settings));
        let cache = Arc::new(StatusCache::new(Arc::clone(&profile)));
        Self {
            inner: Arc::new(DeviceInner {
                identity: Arc::new(identity),
                profile,
                settings,
                cache,
                bus: Arc::new(ChangeBus::new()),
                remote,
                tokens,
                events,
                cancel,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.inner.profile
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.inner.settings
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the reconciliation loop. The first pull starts immediately.
    /// Calling `start` on a running device does nothing.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }
        let worker = ReconciliationLoop {
            identity: Arc::clone(&self.inner.identity),
            profile: Arc::clone(&self.inner.profile),
            cache: Arc::clone(&self.inner.cache),
            bus: Arc::clone(&self.inner.bus),
            remote: Arc::clone(&self.inner.remote),
            tokens: Arc::clone(&self.inner.tokens),
            settings: self.inner.settings.clone(),
            events: self.inner.events.clone(),
            cancel: self.inner.cancel.clone(),
        };
        *task = Some(tokio::spawn(worker.run()));
        debug!(device = %self.inner.identity, "device started");
    }

    /// Stop the loop and wait for it to exit. Pending intent is dropped
    /// with it; an in-flight request's result is discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        debug!(device = %self.inner.identity, "device stopped");
    }

    /// Shut down and tell subscribers the device is gone.
    pub(crate) async fn remove(&self) {
        self.shutdown().await;
        let _ = self.inner.events.send(DeviceEvent::new(
            self.inner.identity.device_id.clone(),
            DeviceEventKind::Removed,
        ));
    }

    // ── Characteristics ──────────────────────────────────────────────

    /// Read a characteristic from the current snapshot. Never does I/O.
    pub fn get(&self, characteristic: Characteristic) -> Result<CharacteristicValue, CoreError> {
        let snap = self.inner.cache.snapshot();
        if let Some(value) = snap.get(characteristic) {
            return Ok(value);
        }
        if snap.characteristics().contains(&characteristic) {
            Err(CoreError::NotYetAvailable {
                device: self.inner.identity.to_string(),
            })
        } else {
            Err(CoreError::UnsupportedCharacteristic {
                device: self.inner.identity.to_string(),
                characteristic,
            })
        }
    }

    /// Request a change. Validation failures are returned here; anything
    /// that goes wrong while pushing is reported as a [`DeviceEvent`].
    pub fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<(), CoreError> {
        self.set_many([(characteristic, value)])
    }

    /// Request several changes at once. Either all are accepted or none.
    pub fn set_many(
        &self,
        fields: impl IntoIterator<Item = (Characteristic, CharacteristicValue)>,
    ) -> Result<(), CoreError> {
        let fields: Vec<_> = fields.into_iter().collect();
        let snap = self.inner.cache.snapshot();
        let device = self.inner.identity.to_string();
        for (characteristic, value) in &fields {
            self.inner
                .profile
                .validate(&device, snap.remote(), *characteristic, value)?;
        }
        if fields.is_empty() {
            return Ok(());
        }

        let prior = self.inner.cache.apply_local(fields);
        self.inner.bus.signal();
        debug!(device = %self.inner.identity, %prior, "local change queued");
        Ok(())
    }

    /// Every exposed characteristic that currently has a value.
    pub fn values(&self) -> Vec<(Characteristic, CharacteristicValue)> {
        self.inner.cache.snapshot().values()
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.inner.cache.snapshot().characteristics()
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.cache.snapshot()
    }

    pub fn state(&self) -> ReconciliationState {
        self.inner.cache.snapshot().state()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.cache.subscribe())
    }

    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Resolve once the loop is idle with no pending intent.
    pub async fn wait_settled(&self) {
        let mut rx = self.inner.cache.subscribe();
        let _ = rx.wait_for(|snap| snap.is_settled()).await;
    }

    /// Resolve with the first snapshot carrying remote state, or with the
    /// error of the pull that gave up first.
    ///
    /// Subscribe-then-check: call it right after `start()`.
    pub async fn wait_for_remote(&self) -> Result<Arc<Snapshot>, CoreError> {
        let mut events = self.inner.events.subscribe();
        let mut rx = self.inner.cache.subscribe();
        let device_id = self.inner.identity.device_id.as_str();

        loop {
            if rx.borrow_and_update().remote().is_some() {
                return Ok(self.inner.cache.snapshot());
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(CoreError::Internal("status cache closed".into()));
                    }
                }
                event = events.recv() => match event {
                    Ok(DeviceEvent { device_id: id, kind: DeviceEventKind::PullFailed { error }, .. })
                        if id == device_id =>
                    {
                        return Err(CoreError::Api { message: error, status: None });
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(CoreError::Internal("event channel closed".into()));
                    }
                },
            }
        }
    }
}
