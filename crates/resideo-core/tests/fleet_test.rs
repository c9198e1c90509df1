// Discovery and fleet lifecycle against a wiremock vendor API.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use resideo_api::{ResideoClient, StaticToken};
use resideo_core::{
    Characteristic, CharacteristicValue, DeviceClass, DeviceEventKind, DeviceSettings,
    DiscoveryReport, FleetConfig, FleetCoordinator, discover_devices,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ResideoClient) {
    let server = MockServer::start().await;
    let base = format!("{}/v2/", server.uri()).parse().unwrap();
    let client = ResideoClient::with_client(
        reqwest::Client::new(),
        base,
        SecretString::from("consumer-key".to_string()),
        Arc::new(StaticToken::new(SecretString::from("access-token".to_string()))),
    );
    (server, client)
}

fn config() -> FleetConfig {
    FleetConfig {
        defaults: DeviceSettings {
            refresh_interval: Duration::from_secs(3600),
            ..DeviceSettings::default()
        },
        discovery_interval: Duration::ZERO,
        token_refresh_interval: Duration::ZERO,
        ..FleetConfig::default()
    }
}

fn locations(with_leak: bool) -> serde_json::Value {
    let mut devices = vec![
        json!({ "deviceID": "LCC-1", "deviceClass": "Thermostat", "deviceModel": "T9-T10",
                "userDefinedDeviceName": "Hallway", "isAlive": true, "units": "Fahrenheit",
                "groups": [ { "id": 0, "name": "Main", "rooms": [0, 1] } ] }),
        json!({ "deviceID": "CAM-1", "deviceClass": "Camera", "isAlive": true }),
        json!({ "deviceID": "SV-1", "deviceClass": "ShutoffValve",
                "userDefinedDeviceName": "Main water", "isAlive": false }),
    ];
    if with_leak {
        devices.push(json!({ "deviceID": "leak-1", "deviceClass": "LeakDetector",
                             "userDefinedDeviceName": "Basement", "isAlive": true }));
    }
    json!([{ "locationID": 42, "name": "Home", "devices": devices }])
}

async fn mount_vendor(server: &MockServer, with_leak: bool) {
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations(with_leak)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/thermostats/LCC-1/group/0/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceId": "LCC-1",
            "groupId": 0,
            "rooms": [
                { "id": 1, "name": "Office", "accessories": [
                    { "accessoryId": 2,
                      "accessoryAttribute": { "type": "IndoorAirSensor", "name": "", "model": "4352" },
                      "accessoryValue": { "indoorTemperature": 71, "indoorHumidity": 40,
                                          "motionDet": false, "occupancyDet": true,
                                          "batteryStatus": "Ok", "status": "Ok" } },
                    { "accessoryId": 3,
                      "accessoryAttribute": { "type": "Thermostat", "name": "Hallway", "model": "T9" } }
                ]}
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/thermostats/LCC-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceID": "LCC-1",
            "deviceModel": "T9-T10",
            "userDefinedDeviceName": "Hallway",
            "isAlive": true,
            "units": "Fahrenheit",
            "indoorTemperature": 68,
            "allowedModes": ["Heat", "Off", "Cool"],
            "minHeatSetpoint": 50,
            "maxHeatSetpoint": 90,
            "minCoolSetpoint": 50,
            "maxCoolSetpoint": 90,
            "changeableValues": { "mode": "Heat", "heatSetpoint": 68, "coolSetpoint": 76 },
            "operationStatus": { "mode": "Heat" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/waterLeakDetectors/leak-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceID": "leak-1",
            "waterPresent": false,
            "batteryRemaining": 80,
            "currentSensorReadings": { "temperature": 18.5, "humidity": 55 },
            "isAlive": true
        })))
        .mount(server)
        .await;
}

// ── Discovery listing ───────────────────────────────────────────────

#[tokio::test]
async fn discovery_skips_unsupported_and_finds_room_sensors() {
    let (server, client) = setup().await;
    mount_vendor(&server, true).await;

    let mut config = config();
    config.devices.insert(
        "leak-1".into(),
        DeviceSettings {
            hidden: true,
            ..DeviceSettings::default()
        },
    );

    let found = discover_devices(&client, &config).await.unwrap();
    let ids: Vec<&str> = found.iter().map(|d| d.identity.device_id.as_str()).collect();
    assert_eq!(ids, vec!["LCC-1", "LCC-1-1-2", "SV-1", "leak-1"]);

    let sensor = &found[1];
    assert_eq!(sensor.identity.class, DeviceClass::RoomSensor);
    assert_eq!(sensor.identity.name, "Office");
    assert_eq!(sensor.location_name, "Home");

    let valve = found.iter().find(|d| d.identity.device_id == "SV-1").unwrap();
    assert!(!valve.alive);
    assert!(!valve.is_managed());

    let leak = found.iter().find(|d| d.identity.device_id == "leak-1").unwrap();
    assert!(leak.hidden);
    assert!(!leak.is_managed());
}

#[tokio::test]
async fn hidden_room_sensors_are_not_listed() {
    let (server, client) = setup().await;
    mount_vendor(&server, false).await;

    let mut config = config();
    config.defaults.thermostat.hide_room_sensors = true;

    let found = discover_devices(&client, &config).await.unwrap();
    assert!(found.iter().all(|d| d.identity.class != DeviceClass::RoomSensor));
}

#[tokio::test]
async fn room_thermostats_are_listed_next_to_their_sensors() {
    let (server, client) = setup().await;
    mount_vendor(&server, false).await;

    let mut config = config();
    config.defaults.thermostat.room_thermostats = true;

    let found = discover_devices(&client, &config).await.unwrap();
    let room_thermostat = found
        .iter()
        .find(|d| d.identity.class == DeviceClass::RoomThermostat)
        .unwrap();
    assert_eq!(room_thermostat.identity.device_id, "LCC-1-1-2-thermostat");
    assert_eq!(room_thermostat.identity.vendor_id(), "LCC-1");
    assert_eq!(room_thermostat.identity.model, "T9-T10");
    assert!(found.iter().any(|d| d.identity.device_id == "LCC-1-1-2"));
}

// ── Coordinator ─────────────────────────────────────────────────────

#[tokio::test]
async fn fleet_starts_managed_devices_and_drops_vanished_ones() {
    let (server, client) = setup().await;
    mount_vendor(&server, true).await;

    let fleet = FleetCoordinator::new(config(), client);
    let report = fleet.start().await.unwrap();
    assert_eq!(
        report,
        DiscoveryReport {
            added: 3,
            removed: 0,
            total: 3,
        }
    );
    assert!(fleet.device("SV-1").is_none());

    let names: Vec<String> = fleet.devices().iter().map(|d| d.identity().name.clone()).collect();
    assert_eq!(names, vec!["Basement", "Hallway", "Office"]);

    let thermostat = fleet.device("LCC-1").unwrap();
    thermostat.wait_for_remote().await.unwrap();
    assert_eq!(
        thermostat.get(Characteristic::HeatingThresholdTemperature).unwrap(),
        CharacteristicValue::Celsius(20.0)
    );

    let sensor = fleet.device("LCC-1-1-2").unwrap();
    sensor.wait_for_remote().await.unwrap();
    assert_eq!(
        sensor.get(Characteristic::OccupancyDetected).unwrap(),
        CharacteristicValue::Bool(true)
    );

    // The leak detector disappears from the account.
    let mut events = fleet.events();
    server.reset().await;
    mount_vendor(&server, false).await;

    let report = fleet.discover().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.total, 2);
    assert!(fleet.device("leak-1").is_none());

    let removed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if event.kind == DeviceEventKind::Removed {
                return event;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(removed.device_id, "leak-1");

    fleet.shutdown().await;
    assert!(fleet.devices().is_empty());
}

#[tokio::test]
async fn failed_room_listing_keeps_room_sensors_running() {
    let (server, client) = setup().await;
    mount_vendor(&server, false).await;

    let fleet = FleetCoordinator::new(config(), client);
    fleet.start().await.unwrap();
    let sensor = fleet.device("LCC-1-1-2").unwrap();
    sensor.wait_for_remote().await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/thermostats/LCC-1/group/0/rooms"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_vendor(&server, false).await;

    let report = fleet.discover().await.unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(report.total, 2);
    assert!(fleet.device("LCC-1-1-2").is_some());

    fleet.shutdown().await;
}

#[tokio::test]
async fn room_thermostat_write_prioritizes_its_room_first() {
    let (server, client) = setup().await;
    mount_vendor(&server, false).await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/thermostats/LCC-1/priority"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceId": "LCC-1",
            "currentPriority": { "priorityType": "PickARoom", "selectedRooms": [0] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/devices/thermostats/LCC-1/priority"))
        .and(body_json(json!({
            "currentPriority": { "priorityType": "PickARoom", "selectedRooms": [1] }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/devices/thermostats/LCC-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config();
    config.defaults.thermostat.hide_room_sensors = true;
    config.defaults.thermostat.room_thermostats = true;
    let fleet = FleetCoordinator::new(config, client);
    fleet.start().await.unwrap();

    let office = fleet.device("LCC-1-1-2-thermostat").unwrap();
    office.wait_for_remote().await.unwrap();
    // The room's own reading, not the thermostat's.
    assert_eq!(
        office.get(Characteristic::CurrentTemperature).unwrap(),
        CharacteristicValue::Celsius(21.5)
    );

    office
        .set(Characteristic::HeatingThresholdTemperature, CharacteristicValue::Celsius(21.0))
        .unwrap();
    office.wait_settled().await;

    let writes: Vec<(String, String)> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() != "GET")
        .map(|r| (r.method.to_string(), r.url.path().to_owned()))
        .collect();
    assert_eq!(
        writes,
        vec![
            ("PUT".to_owned(), "/v2/devices/thermostats/LCC-1/priority".to_owned()),
            ("POST".to_owned(), "/v2/devices/thermostats/LCC-1".to_owned()),
        ]
    );

    fleet.shutdown().await;
}
