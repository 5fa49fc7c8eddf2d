use std::time::Duration;

use mc_herd::config::{DriverKind, GlobalConfig};
use mc_herd::AppError;

fn sample_toml() -> &'static str {
    r#"
default_server = "mc.example.net:25570"
driver = "sim"
accounts_path = "data/accounts.json"
proxies_path = "data/proxies.txt"
logs_dir = "data/logs"
chatlog_path = "data/chatlog.txt"
ipc_name = "herd-test"

[reconnect]
enabled = true
kick_delay_ms = 1000
disconnect_delay_ms = 2000
max_attempts = 5

[auth]
login_delay_ms = 100
register_delay_ms = 200
login_command = "/l {password}"
register_command = "/reg {password} {password}"

[actions]
tick_ms = 400
hold_min_ms = 100
hold_max_ms = 900
spam_probability = 0.5

[status]
timeout_ms = 1500

[proxies]
watch = true
"#
}

#[test]
fn parses_every_section() {
    let config = GlobalConfig::from_toml_str(sample_toml()).expect("valid config");

    assert_eq!(config.default_server, "mc.example.net:25570");
    assert_eq!(config.driver, DriverKind::Sim);
    assert_eq!(config.ipc_name, "herd-test");
    assert_eq!(config.reconnect.kick_delay(), Duration::from_millis(1000));
    assert_eq!(config.reconnect.disconnect_delay(), Duration::from_millis(2000));
    assert_eq!(config.reconnect.max_attempts, 5);
    assert_eq!(config.auth.login_command, "/l {password}");
    assert_eq!(config.actions.tick_ms, 400);
    assert!((config.actions.spam_probability - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.status_timeout(), Duration::from_millis(1500));
    assert!(config.proxies.watch);
}

#[test]
fn empty_document_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("defaults are valid");

    assert_eq!(config.default_server, "localhost:25565");
    assert!(config.reconnect.enabled);
    assert_eq!(config.reconnect.kick_delay(), Duration::from_millis(3000));
    assert_eq!(config.reconnect.disconnect_delay(), Duration::from_millis(4000));
    assert_eq!(config.reconnect.max_attempts, 0);
    assert_eq!(config.auth.login_delay_ms, 1500);
    assert_eq!(config.auth.register_delay_ms, 2500);
    assert_eq!(config.actions.tick_ms, 800);
    assert_eq!(config.actions.hold_min_ms, 500);
    assert_eq!(config.actions.hold_max_ms, 2500);
    assert!((config.actions.spam_probability - 0.02).abs() < f64::EPSILON);
    assert_eq!(config.status_timeout(), Duration::from_millis(3000));
    assert!(!config.proxies.watch);
}

#[test]
fn rejects_zero_tick() {
    let result = GlobalConfig::from_toml_str("[actions]\ntick_ms = 0\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("tick_ms")));
}

#[test]
fn rejects_inverted_hold_range() {
    let result =
        GlobalConfig::from_toml_str("[actions]\nhold_min_ms = 3000\nhold_max_ms = 2000\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("hold_min_ms")));
}

#[test]
fn rejects_probability_out_of_range() {
    let result = GlobalConfig::from_toml_str("[actions]\nspam_probability = 1.5\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("spam_probability")));
}

#[test]
fn rejects_zero_status_timeout() {
    let result = GlobalConfig::from_toml_str("[status]\ntimeout_ms = 0\n");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn rejects_empty_ipc_name_when_enabled() {
    let result = GlobalConfig::from_toml_str("ipc_name = \"\"\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("ipc_name")));

    let disabled = GlobalConfig::from_toml_str("ipc_name = \"\"\nipc_enabled = false\n");
    assert!(disabled.is_ok());
}

#[test]
fn rejects_unknown_driver() {
    let result = GlobalConfig::from_toml_str("driver = \"mineflayer\"\n");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mc-herd.toml");
    std::fs::write(&path, sample_toml()).expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.ipc_name, "herd-test");
}

#[test]
fn load_from_missing_path_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = GlobalConfig::load_from_path(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(AppError::Config(_))));
}
