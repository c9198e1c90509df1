// ── Per-device status cache ──
//
// The only mutable state shared between characteristic callers and the
// reconciliation loop. Every mutation is a short, synchronous
// copy-on-write of the current `Snapshot` inside the watch channel, so
// readers always see a consistent whole and subscribers are notified.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use strum::Display;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::model::{
    Characteristic, CharacteristicValue, IntentBatch, PendingIntent, RemoteState,
};
use crate::profile::DeviceProfile;

/// Where a device's reconciliation loop is. Exactly one at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReconciliationState {
    Idle,
    PullInFlight,
    /// Intent accumulated, debounce timer running.
    PushPending,
    PushInFlight,
    /// Waiting to retry after a failure.
    Backoff { attempt: u32, until: Instant },
}

/// An immutable view of one device: the last confirmed remote state
/// overlaid with unconfirmed local intent.
#[derive(Debug, Clone)]
pub struct Snapshot {
    profile: Arc<DeviceProfile>,
    remote: Option<Arc<RemoteState>>,
    pending: PendingIntent,
    state: ReconciliationState,
    fault: bool,
    last_pull: Option<DateTime<Utc>>,
    generation: u64,
}

impl Snapshot {
    fn new(profile: Arc<DeviceProfile>) -> Self {
        Self {
            profile,
            remote: None,
            pending: PendingIntent::default(),
            state: ReconciliationState::Idle,
            fault: false,
            last_pull: None,
            generation: 0,
        }
    }

    /// Current value of a characteristic. Pending intent wins over the
    /// remote state.
    pub fn get(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        if let Some(value) = self.pending.get(characteristic) {
            return Some(value.clone());
        }
        if characteristic == Characteristic::StatusFault && self.fault {
            return Some(CharacteristicValue::Bool(true));
        }
        let remote = self.remote.as_deref()?;
        self.profile.project(remote, &self.pending, characteristic)
    }

    /// Every characteristic the device exposes that currently has a value.
    pub fn values(&self) -> Vec<(Characteristic, CharacteristicValue)> {
        self.characteristics()
            .into_iter()
            .filter_map(|c| self.get(c).map(|v| (c, v)))
            .collect()
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.profile.characteristics(self.remote.as_deref())
    }

    pub fn remote(&self) -> Option<&RemoteState> {
        self.remote.as_deref()
    }

    pub fn pending(&self) -> &PendingIntent {
        &self.pending
    }

    pub fn state(&self) -> ReconciliationState {
        self.state
    }

    /// Set after a push was abandoned under the fault policy; cleared by
    /// the next successful pull.
    pub fn is_faulted(&self) -> bool {
        self.fault
    }

    pub fn last_pull(&self) -> Option<DateTime<Utc>> {
        self.last_pull
    }

    /// Idle with nothing left to push.
    pub fn is_settled(&self) -> bool {
        self.state == ReconciliationState::Idle && self.pending.is_empty()
    }
}

/// Owner of one device's `Snapshot`.
pub struct StatusCache {
    tx: watch::Sender<Arc<Snapshot>>,
}

impl StatusCache {
    pub fn new(profile: Arc<DeviceProfile>) -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::new(profile)));
        Self { tx }
    }

    /// Merge local writes into the pending intent and return the state the
    /// loop was in when they landed.
    pub fn apply_local(
        &self,
        fields: impl IntoIterator<Item = (Characteristic, CharacteristicValue)>,
    ) -> ReconciliationState {
        let mut prior = ReconciliationState::Idle;
        self.tx.send_modify(|snap| {
            let snap = Arc::make_mut(snap);
            prior = snap.state;
            snap.generation += 1;
            snap.pending.merge(fields, snap.generation);
        });
        prior
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Replace the remote state wholesale. Pending intent is untouched, so
    /// fields it covers keep their local values.
    pub fn apply_remote(&self, state: RemoteState) {
        let remote = Arc::new(state);
        self.tx.send_modify(|snap| {
            let snap = Arc::make_mut(snap);
            snap.remote = Some(remote);
            snap.fault = false;
            snap.last_pull = Some(Utc::now());
        });
    }

    /// Freeze the current pending intent for one push.
    pub(crate) fn take_batch(&self) -> Option<IntentBatch> {
        self.tx.borrow().pending.batch()
    }

    /// The push carrying `batch` was confirmed.
    pub fn commit_intent(&self, batch: &IntentBatch) {
        self.tx.send_modify(|snap| Arc::make_mut(snap).pending.retire(batch));
    }

    /// The push carrying `batch` failed for good. With `fault` set the
    /// device reports `StatusFault` until the next successful pull.
    pub fn abandon_intent(&self, batch: &IntentBatch, fault: bool) {
        self.tx.send_modify(|snap| {
            let snap = Arc::make_mut(snap);
            snap.pending.retire(batch);
            snap.fault |= fault;
        });
    }

    pub(crate) fn set_state(&self, state: ReconciliationState) {
        self.tx.send_if_modified(|snap| {
            if snap.state == state {
                return false;
            }
            Arc::make_mut(snap).state = state;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use resideo_api::models::ShutoffValve;
    use serde_json::json;

    use super::*;
    use crate::config::DeviceSettings;
    use crate::model::{DeviceClass, DeviceIdentity};

    fn valve_cache() -> StatusCache {
        let identity = DeviceIdentity::new("SV-1", DeviceClass::Valve, 1, "Main", "Valve");
        let profile = DeviceProfile::for_device(&identity, &DeviceSettings::default());
        StatusCache::new(Arc::new(profile))
    }

    fn valve(status: &str) -> RemoteState {
        let valve: ShutoffValve = serde_json::from_value(json!({
            "deviceID": "SV-1",
            "actuatorValve": { "valveStatus": status }
        }))
        .unwrap();
        RemoteState::Valve(valve)
    }

    #[test]
    fn local_intent_survives_a_stale_pull() {
        let cache = valve_cache();
        cache.apply_remote(valve("Closed"));

        let prior = cache.apply_local([(Characteristic::ValveActive, CharacteristicValue::Bool(true))]);
        assert_eq!(prior, ReconciliationState::Idle);

        // A pull that raced ahead of the push still reports closed.
        cache.apply_remote(valve("Closed"));
        let snap = cache.snapshot();
        assert_eq!(
            snap.get(Characteristic::ValveActive),
            Some(CharacteristicValue::Bool(true))
        );
        assert_eq!(
            snap.get(Characteristic::InUse),
            Some(CharacteristicValue::Bool(false))
        );

        let batch = cache.take_batch().unwrap();
        cache.abandon_intent(&batch, false);
        assert_eq!(
            cache.snapshot().get(Characteristic::ValveActive),
            Some(CharacteristicValue::Bool(false))
        );
    }

    #[test]
    fn abandon_with_fault_raises_status_fault_until_next_pull() {
        let cache = valve_cache();
        cache.apply_remote(valve("Open"));
        cache.apply_local([(Characteristic::ValveActive, CharacteristicValue::Bool(false))]);
        let batch = cache.take_batch().unwrap();
        cache.abandon_intent(&batch, true);

        assert_eq!(
            cache.snapshot().get(Characteristic::StatusFault),
            Some(CharacteristicValue::Bool(true))
        );
        cache.apply_remote(valve("Open"));
        assert_eq!(
            cache.snapshot().get(Characteristic::StatusFault),
            Some(CharacteristicValue::Bool(false))
        );
    }

    #[test]
    fn earlier_snapshots_are_not_mutated() {
        let cache = valve_cache();
        let before = cache.snapshot();
        cache.apply_local([(Characteristic::ValveActive, CharacteristicValue::Bool(true))]);
        assert!(before.pending().is_empty());
        assert_eq!(cache.snapshot().pending().len(), 1);
    }

    #[test]
    fn state_changes_notify_subscribers_once() {
        let cache = valve_cache();
        let mut rx = cache.subscribe();
        cache.set_state(ReconciliationState::PullInFlight);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        cache.set_state(ReconciliationState::PullInFlight);
        assert!(!rx.has_changed().unwrap());
    }
}
