// Reconciliation loop behaviour against a scripted in-memory device.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use resideo_api::models::{ShutoffValve, Thermostat};
use resideo_api::{Error as ApiError, TokenSource};
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::{Notify, Semaphore, broadcast};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use resideo_core::{
    Characteristic, CharacteristicValue, CoreError, DeviceClass, DeviceController, DeviceEvent,
    DeviceEventKind, DeviceIdentity, DeviceProfile, DeviceSettings, HeatingCoolingState,
    PushRequest, ReconciliationState, RemoteDevice, RemoteState, RetryPolicy, ThermostatState,
};

// ── Scripted device ─────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    push_errors: VecDeque<ApiError>,
    pull_errors: VecDeque<ApiError>,
}

struct MockRemote {
    state: Mutex<RemoteState>,
    script: Mutex<Script>,
    /// Every push attempt, failed ones included.
    pushes: Mutex<Vec<(Instant, PushRequest)>>,
    pulls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// When set, each push blocks until a permit is added.
    gate: Option<Semaphore>,
    entered: Notify,
}

impl MockRemote {
    fn new(state: RemoteState) -> Self {
        Self {
            state: Mutex::new(state),
            script: Mutex::new(Script::default()),
            pushes: Mutex::new(Vec::new()),
            pulls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: None,
            entered: Notify::new(),
        }
    }

    fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    fn fail_pushes(&self, errors: impl IntoIterator<Item = ApiError>) {
        self.script.lock().unwrap().push_errors.extend(errors);
    }

    fn fail_pulls(&self, errors: impl IntoIterator<Item = ApiError>) {
        self.script.lock().unwrap().pull_errors.extend(errors);
    }

    fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    fn push_times(&self) -> Vec<Instant> {
        self.pushes.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    /// What the vendor reports from now on.
    fn set_state(&self, state: RemoteState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl RemoteDevice for MockRemote {
    async fn pull(
        &self,
        _identity: &DeviceIdentity,
        _profile: &DeviceProfile,
    ) -> Result<RemoteState, ApiError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.script.lock().unwrap().pull_errors.pop_front() {
            return Err(err);
        }
        Ok(self.state.lock().unwrap().clone())
    }

    async fn push(&self, _identity: &DeviceIdentity, request: &PushRequest) -> Result<(), ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.pushes
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.lock().unwrap().push_errors.pop_front();
        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct CountingTokens {
    refreshes: AtomicUsize,
}

#[async_trait]
impl TokenSource for CountingTokens {
    fn access_token(&self) -> SecretString {
        SecretString::from("access-token".to_string())
    }

    async fn refresh(&self) -> Result<(), ApiError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn server_error() -> ApiError {
    ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into(), None)
}

/// A connection-level failure, as reqwest reports it.
fn transport_error() -> ApiError {
    ApiError::Transport(reqwest::Client::new().get("http://[::1").build().unwrap_err())
}

fn thermostat_state(mode: &str, operating: &str) -> RemoteState {
    let thermostat: Thermostat = serde_json::from_value(json!({
        "deviceID": "LCC-1",
        "deviceModel": "T5-T6",
        "userDefinedDeviceName": "Hallway",
        "isAlive": true,
        "units": "Fahrenheit",
        "indoorTemperature": 71,
        "indoorHumidity": 40,
        "allowedModes": ["Heat", "Off", "Cool", "Auto"],
        "minHeatSetpoint": 50,
        "maxHeatSetpoint": 90,
        "minCoolSetpoint": 50,
        "maxCoolSetpoint": 90,
        "changeableValues": {
            "mode": mode,
            "heatSetpoint": 66,
            "coolSetpoint": 76,
            "thermostatSetpointStatus": "NoHold"
        },
        "operationStatus": { "mode": operating }
    }))
    .unwrap();
    RemoteState::Thermostat(ThermostatState {
        thermostat,
        fan: None,
        priority: None,
    })
}

fn valve_state(status: &str) -> RemoteState {
    let valve: ShutoffValve = serde_json::from_value(json!({
        "deviceID": "SV-1",
        "isAlive": true,
        "actuatorValve": { "valveStatus": status }
    }))
    .unwrap();
    RemoteState::Valve(valve)
}

fn settings() -> DeviceSettings {
    DeviceSettings {
        refresh_interval: Duration::from_secs(3600),
        push_delay: Duration::from_millis(100),
        push_retry: RetryPolicy {
            jitter: false,
            ..RetryPolicy::for_push()
        },
        pull_retry: RetryPolicy {
            jitter: false,
            ..RetryPolicy::for_pull()
        },
        ..DeviceSettings::default()
    }
}

struct Harness {
    remote: Arc<MockRemote>,
    tokens: Arc<CountingTokens>,
    device: DeviceController,
}

fn harness(class: DeviceClass, remote: MockRemote) -> Harness {
    let identity = match class {
        DeviceClass::Valve => DeviceIdentity::new("SV-1", class, 1, "Main water", "ShutoffValve"),
        _ => DeviceIdentity::new("LCC-1", class, 1, "Hallway", "T5-T6"),
    };
    let remote = Arc::new(remote);
    let tokens = Arc::new(CountingTokens {
        refreshes: AtomicUsize::new(0),
    });
    let (events, _) = broadcast::channel(64);
    let device = DeviceController::new(
        identity,
        settings(),
        Arc::clone(&remote) as Arc<dyn RemoteDevice>,
        Arc::clone(&tokens) as Arc<dyn TokenSource>,
        events,
        CancellationToken::new(),
    );
    Harness {
        remote,
        tokens,
        device,
    }
}

async fn started_thermostat() -> Harness {
    let h = harness(
        DeviceClass::Thermostat,
        MockRemote::new(thermostat_state("Off", "EquipmentOff")),
    );
    h.device.start().await;
    h.device.wait_for_remote().await.unwrap();
    h
}

fn thermostat_body(request: &PushRequest) -> serde_json::Value {
    match request {
        PushRequest::Thermostat(req) => serde_json::to_value(req).unwrap(),
        other => panic!("expected a thermostat push, got {other:?}"),
    }
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<DeviceEvent>,
    matches: impl Fn(&DeviceEventKind) -> bool,
) -> DeviceEvent {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = events.recv().await.unwrap();
            if matches(&event.kind) {
                return event;
            }
        }
    })
    .await
    .unwrap()
}

fn celsius(v: f64) -> CharacteristicValue {
    CharacteristicValue::Celsius(v)
}

// ── Coalescing ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_sets_becomes_one_push() {
    let h = started_thermostat().await;

    h.device
        .set(
            Characteristic::TargetHeatingCoolingState,
            CharacteristicValue::HeatingCooling(HeatingCoolingState::Heat),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.device.set(Characteristic::TargetTemperature, celsius(21.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.device.set(Characteristic::TargetTemperature, celsius(21.0)).unwrap();

    h.device.wait_settled().await;

    let pushes = h.remote.pushes();
    assert_eq!(pushes.len(), 1);
    let body = thermostat_body(&pushes[0]);
    assert_eq!(body["mode"], json!("Heat"));
    assert_eq!(body["heatSetpoint"], json!(70));
    assert_eq!(body["coolSetpoint"], json!(76));
    assert_eq!(body["thermostatSetpointStatus"], json!("PermanentHold"));
}

#[tokio::test(start_paused = true)]
async fn spaced_sets_push_separately() {
    let h = started_thermostat().await;

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    h.device.wait_settled().await;
    h.device
        .set(Characteristic::CoolingThresholdTemperature, celsius(25.0))
        .unwrap();
    h.device.wait_settled().await;

    assert_eq!(h.remote.pushes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn set_during_push_waits_for_the_next_cycle() {
    let h = harness(
        DeviceClass::Thermostat,
        MockRemote::new(thermostat_state("Off", "EquipmentOff")).gated(),
    );
    h.device.start().await;
    h.device.wait_for_remote().await.unwrap();

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    h.remote.entered.notified().await;

    h.device
        .set(Characteristic::CoolingThresholdTemperature, celsius(25.0))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.remote.pushes().len(), 1);
    assert_eq!(h.device.state(), ReconciliationState::PushInFlight);

    h.remote.gate.as_ref().unwrap().add_permits(10);
    h.device.wait_settled().await;

    let pushes = h.remote.pushes();
    assert_eq!(pushes.len(), 2);
    assert_eq!(h.remote.max_in_flight.load(Ordering::SeqCst), 1);
    let second = thermostat_body(&pushes[1]);
    assert_eq!(second["coolSetpoint"], json!(77));
    assert_eq!(second["heatSetpoint"], json!(66));
}

// ── Local wins ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn local_value_is_visible_before_the_push() {
    let h = started_thermostat().await;

    assert_eq!(
        h.device.get(Characteristic::HeatingThresholdTemperature).unwrap(),
        celsius(19.0)
    );
    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(22.0))
        .unwrap();

    assert_eq!(
        h.device.get(Characteristic::HeatingThresholdTemperature).unwrap(),
        celsius(22.0)
    );
    assert!(h.remote.pushes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_set_is_rejected_without_io() {
    let h = started_thermostat().await;

    let err = h
        .device
        .set(Characteristic::TargetTemperature, celsius(40.0))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidValue { .. }));

    let err = h
        .device
        .set(Characteristic::CurrentTemperature, celsius(20.0))
        .unwrap_err();
    assert!(matches!(err, CoreError::ReadOnly { .. }));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.remote.pushes().is_empty());
}

// ── Projection ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn auto_mode_reports_what_the_equipment_is_doing() {
    let h = harness(
        DeviceClass::Thermostat,
        MockRemote::new(thermostat_state("Auto", "Cool")),
    );
    h.device.start().await;
    h.device.wait_for_remote().await.unwrap();

    assert_eq!(
        h.device.get(Characteristic::TargetHeatingCoolingState).unwrap(),
        CharacteristicValue::HeatingCooling(HeatingCoolingState::Auto)
    );
    assert_eq!(
        h.device.get(Characteristic::CurrentHeatingCoolingState).unwrap(),
        CharacteristicValue::HeatingCooling(HeatingCoolingState::Cool)
    );
    assert_eq!(
        h.device.get(Characteristic::TargetTemperature).unwrap(),
        celsius(24.5)
    );
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failing_push_backs_off_then_gives_up() {
    let h = started_thermostat().await;
    h.remote.fail_pushes((0..5).map(|_| server_error()));
    let mut events = h.device.events();

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(22.0))
        .unwrap();

    let event = wait_for_event(&mut events, |k| {
        matches!(k, DeviceEventKind::PushAbandoned { .. })
    })
    .await;
    assert_eq!(event.device_id, "LCC-1");
    h.device.wait_settled().await;

    let times = h.remote.push_times();
    assert_eq!(times.len(), 5);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    for (gap, expected) in gaps.iter().zip([1, 2, 4, 8]) {
        assert!(*gap >= Duration::from_secs(expected), "gap {gap:?} < {expected}s");
    }
    assert!(gaps.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(h.device.state(), ReconciliationState::Idle);
    // Thermostats do not fault; the field falls back to the vendor value.
    assert_eq!(
        h.device.get(Characteristic::StatusFault).unwrap(),
        CharacteristicValue::Bool(false)
    );
    assert_eq!(
        h.device.get(Characteristic::HeatingThresholdTemperature).unwrap(),
        celsius(19.0)
    );
}

#[tokio::test(start_paused = true)]
async fn transport_errors_back_off_like_server_errors() {
    let h = started_thermostat().await;
    h.remote.fail_pushes([transport_error(), transport_error()]);
    let mut events = h.device.events();

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    wait_for_event(&mut events, |k| {
        matches!(k, DeviceEventKind::PushSucceeded { .. })
    })
    .await;

    let times = h.remote.push_times();
    assert_eq!(times.len(), 3);
    assert!(times[1] - times[0] >= Duration::from_secs(1));
    assert!(times[2] - times[1] >= Duration::from_secs(2));
    assert_eq!(h.tokens.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn push_retry_carries_edits_made_during_the_backoff() {
    let h = started_thermostat().await;
    h.remote.fail_pushes([server_error()]);

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(
        h.device.state(),
        ReconciliationState::Backoff { attempt: 1, .. }
    ));

    h.device
        .set(Characteristic::CoolingThresholdTemperature, celsius(25.0))
        .unwrap();
    h.device.wait_settled().await;

    let pushes = h.remote.pushes();
    assert_eq!(pushes.len(), 2);
    let first = thermostat_body(&pushes[0]);
    assert_eq!(first["heatSetpoint"], json!(68));
    assert_eq!(first["coolSetpoint"], json!(76));
    let retry = thermostat_body(&pushes[1]);
    assert_eq!(retry["heatSetpoint"], json!(68));
    assert_eq!(retry["coolSetpoint"], json!(77));
}

#[tokio::test(start_paused = true)]
async fn failed_confirmation_pull_is_retried_before_commit() {
    let h = harness(DeviceClass::Valve, MockRemote::new(valve_state("Open")));
    h.device.start().await;
    h.device.wait_for_remote().await.unwrap();
    let pulls_before = h.remote.pulls();

    // The vendor closes the valve, but the first read-back fails.
    h.remote.set_state(valve_state("Closed"));
    h.remote.fail_pulls([server_error()]);
    h.device
        .set(Characteristic::ValveActive, CharacteristicValue::Bool(false))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.remote.pushes().len(), 1);
    assert!(matches!(
        h.device.state(),
        ReconciliationState::Backoff { attempt: 1, .. }
    ));
    assert_eq!(
        h.device.get(Characteristic::ValveActive).unwrap(),
        CharacteristicValue::Bool(false)
    );

    h.device.wait_settled().await;
    assert_eq!(h.remote.pulls() - pulls_before, 2);
    assert_eq!(h.remote.pushes().len(), 1);
    assert_eq!(
        h.device.get(Characteristic::ValveActive).unwrap(),
        CharacteristicValue::Bool(false)
    );
    assert!(h.device.snapshot().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_confirmation_pull_commits_and_reports() {
    let h = harness(DeviceClass::Valve, MockRemote::new(valve_state("Open")));
    h.device.start().await;
    h.device.wait_for_remote().await.unwrap();
    h.remote.fail_pulls((0..3).map(|_| server_error()));
    let mut events = h.device.events();

    h.device
        .set(Characteristic::ValveActive, CharacteristicValue::Bool(false))
        .unwrap();
    wait_for_event(&mut events, |k| {
        matches!(k, DeviceEventKind::PullFailed { .. })
    })
    .await;
    h.device.wait_settled().await;

    assert!(h.device.snapshot().pending().is_empty());
    // Nothing newer than the last good pull is known.
    assert_eq!(
        h.device.get(Characteristic::ValveActive).unwrap(),
        CharacteristicValue::Bool(true)
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_token_is_refreshed_and_retried_immediately() {
    let h = started_thermostat().await;
    h.remote.fail_pushes([ApiError::from_status(
        StatusCode::UNAUTHORIZED,
        "expired".into(),
        None,
    )]);

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    h.device.wait_settled().await;

    assert_eq!(h.tokens.refreshes.load(Ordering::SeqCst), 1);
    let times = h.remote.push_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_longer_than_a_server_error() {
    async fn first_retry_gap(error: ApiError) -> Duration {
        let h = started_thermostat().await;
        h.remote.fail_pushes([error]);
        h.device
            .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
            .unwrap();
        h.device.wait_settled().await;
        let times = h.remote.push_times();
        assert_eq!(times.len(), 2);
        times[1] - times[0]
    }

    let server = first_retry_gap(server_error()).await;
    let limited = first_retry_gap(ApiError::from_status(
        StatusCode::TOO_MANY_REQUESTS,
        String::new(),
        None,
    ))
    .await;

    assert!(limited > server, "{limited:?} <= {server:?}");
}

#[tokio::test(start_paused = true)]
async fn exhausted_pull_reports_failure_and_keeps_no_state() {
    let h = harness(
        DeviceClass::Thermostat,
        MockRemote::new(thermostat_state("Off", "EquipmentOff")),
    );
    h.remote.fail_pulls((0..3).map(|_| server_error()));
    h.device.start().await;

    let err = h.device.wait_for_remote().await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));
    assert_eq!(h.remote.pulls(), 3);
    assert!(matches!(
        h.device.get(Characteristic::CurrentTemperature),
        Err(CoreError::NotYetAvailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn local_change_cuts_a_pull_backoff_short() {
    let h = harness(
        DeviceClass::Thermostat,
        MockRemote::new(thermostat_state("Off", "EquipmentOff")),
    );
    h.remote.fail_pulls([server_error()]);
    let started = Instant::now();
    h.device.start().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(matches!(
        h.device.state(),
        ReconciliationState::Backoff { attempt: 1, .. }
    ));

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    h.device.wait_settled().await;

    assert_eq!(h.remote.pushes().len(), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn abandoned_valve_push_raises_fault() {
    let h = harness(DeviceClass::Valve, MockRemote::new(valve_state("Open")));
    h.device.start().await;
    h.device.wait_for_remote().await.unwrap();
    h.remote.fail_pushes((0..5).map(|_| server_error()));
    let mut events = h.device.events();

    h.device
        .set(Characteristic::ValveActive, CharacteristicValue::Bool(false))
        .unwrap();
    wait_for_event(&mut events, |k| {
        matches!(k, DeviceEventKind::PushAbandoned { .. })
    })
    .await;

    assert_eq!(
        h.device.get(Characteristic::StatusFault).unwrap(),
        CharacteristicValue::Bool(true)
    );
    assert_eq!(
        h.device.get(Characteristic::ValveActive).unwrap(),
        CharacteristicValue::Bool(true)
    );
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let h = started_thermostat().await;
    h.device.shutdown().await;
    let pulls = h.remote.pulls();

    h.device
        .set(Characteristic::HeatingThresholdTemperature, celsius(20.0))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(7200)).await;

    assert_eq!(h.remote.pulls(), pulls);
    assert!(h.remote.pushes().is_empty());
}
