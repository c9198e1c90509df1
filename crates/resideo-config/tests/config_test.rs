// Loading, overriding and saving config files.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use resideo_api::models::PriorityType;
use resideo_config::{Config, ConfigError, load_config_from, save_config};
use resideo_core::{DeviceLogging, PushFailurePolicy};

fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Loading ─────────────────────────────────────────────────────────

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.options.refresh_rate, 120);
    assert!(cfg.devices.is_empty());
}

#[test]
fn device_overrides_layer_onto_options() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"
[credentials]
consumer_key_env = "MY_KEY"

[options]
refresh_rate = 300
push_rate = 0.5
logging = "debug"

[[devices]]
device_id = "LCC-1"
refresh_rate = 60
retry = false

[devices.thermostat]
hide_fan = true
show_auto = true
room_priority = true
room_thermostats = true
priority_type = "FollowMe"
thermostat_setpoint_status = "NoHold"

[[devices]]
device_id = "SV-1"
hide_device = true
logging = "none"

[devices.valve]
push_failure = "silent"
"#,
    );

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.credentials.consumer_key_env.as_deref(), Some("MY_KEY"));

    let fleet = cfg.to_fleet_config().unwrap();
    assert_eq!(fleet.defaults.refresh_interval, Duration::from_secs(300));
    assert_eq!(fleet.defaults.push_delay, Duration::from_millis(500));
    assert_eq!(fleet.defaults.logging, DeviceLogging::Debug);

    let thermostat = fleet.settings_for("LCC-1");
    assert_eq!(thermostat.refresh_interval, Duration::from_secs(60));
    assert_eq!(thermostat.push_delay, Duration::from_millis(500));
    assert!(!thermostat.retry);
    assert!(thermostat.thermostat.hide_fan);
    assert!(thermostat.thermostat.show_auto);
    assert!(thermostat.thermostat.room_priority);
    assert!(thermostat.thermostat.room_thermostats);
    assert_eq!(thermostat.thermostat.priority_type, PriorityType::FollowMe);
    assert_eq!(thermostat.thermostat.setpoint_status, "NoHold");

    let valve = fleet.settings_for("SV-1");
    assert!(valve.hidden);
    assert_eq!(valve.logging, DeviceLogging::None);
    assert_eq!(valve.valve.push_failure, PushFailurePolicy::Silent);

    // Unlisted devices get the defaults.
    assert_eq!(fleet.settings_for("leak-1").valve.push_failure, PushFailurePolicy::Fault);
}

#[test]
fn invalid_refresh_rate_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[options]\nrefresh_rate = 5\n");

    let err = load_config_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "options.refresh_rate"));
}

#[test]
fn malformed_toml_is_a_figment_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[options\nrefresh_rate = ");

    assert!(matches!(load_config_from(&path), Err(ConfigError::Figment(_))));
}

// ── Saving ──────────────────────────────────────────────────────────

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.options.refresh_rate = 90;
    cfg.credentials.access_token_env = Some("TOKEN_VAR".into());
    save_config(&cfg, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.options.refresh_rate, 90);
    assert_eq!(loaded.credentials.access_token_env.as_deref(), Some("TOKEN_VAR"));
}
