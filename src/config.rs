//! Global configuration parsing and validation.
//!
//! Every field has a default, so running without a config file is
//! equivalent to loading an empty TOML document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Protocol-client driver used to build session handles.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// In-process simulated server; no network traffic.
    #[default]
    Sim,
}

/// Reconnection policy applied to every session.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ReconnectConfig {
    /// Whether kicked or disconnected sessions are recreated.
    pub enabled: bool,
    /// Delay before recreating a kicked session.
    pub kick_delay_ms: u64,
    /// Delay before recreating a disconnected or errored session.
    pub disconnect_delay_ms: u64,
    /// Consecutive attempts before giving up; 0 means unbounded.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kick_delay_ms: 3000,
            disconnect_delay_ms: 4000,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Delay applied after a kick.
    #[must_use]
    pub fn kick_delay(&self) -> Duration {
        Duration::from_millis(self.kick_delay_ms)
    }

    /// Delay applied after a disconnect or transport error.
    #[must_use]
    pub fn disconnect_delay(&self) -> Duration {
        Duration::from_millis(self.disconnect_delay_ms)
    }
}

/// Login/register command sequence issued after spawn.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct AuthConfig {
    /// Delay between spawn and the login command.
    pub login_delay_ms: u64,
    /// Delay between the login and the register command.
    pub register_delay_ms: u64,
    /// Login command template; `{password}` is substituted.
    pub login_command: String,
    /// Register command template; `{password}` is substituted.
    pub register_command: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_delay_ms: 1500,
            register_delay_ms: 2500,
            login_command: "/login {password}".into(),
            register_command: "/register {password} {password}".into(),
        }
    }
}

/// Action scheduler timing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct ActionConfig {
    /// Period of the action tick.
    pub tick_ms: u64,
    /// Lower bound (inclusive) of a movement hold window.
    pub hold_min_ms: u64,
    /// Upper bound (exclusive) of a movement hold window.
    pub hold_max_ms: u64,
    /// Per-tick, per-session probability of a spam message.
    pub spam_probability: f64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 800,
            hold_min_ms: 500,
            hold_max_ms: 2500,
            spam_probability: 0.02,
        }
    }
}

/// Remote status query settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct StatusConfig {
    /// Overall timeout for one status query.
    pub timeout_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

/// Proxy list handling.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ProxyConfig {
    /// Reload the proxies file automatically when it changes on disk.
    pub watch: bool,
}

/// Simulated driver behavior.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct SimConfig {
    /// Delay between handle construction and the `connected` event.
    pub connect_latency_ms: u64,
    /// Delay between `connected` and `spawned`.
    pub spawn_delay_ms: u64,
    /// Half-width of the square in which simulated players spawn.
    pub spawn_radius: f64,
    /// Mobs placed in the simulated world when the connector is built.
    pub mobs: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            connect_latency_ms: 250,
            spawn_delay_ms: 250,
            spawn_radius: 16.0,
            mobs: 2,
        }
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    /// Server used by `--count` auto-start when `--server` is absent.
    pub default_server: String,
    /// Protocol-client driver.
    pub driver: DriverKind,
    /// Ordered account list (JSON).
    pub accounts_path: PathBuf,
    /// Newline-separated proxy endpoints.
    pub proxies_path: PathBuf,
    /// Directory holding one log file per identity.
    pub logs_dir: PathBuf,
    /// Consolidated chat transcript.
    pub chatlog_path: PathBuf,
    /// Named pipe / Unix socket identifier for `mc-herd-ctl`.
    pub ipc_name: String,
    /// Whether the IPC control socket is started.
    pub ipc_enabled: bool,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
    /// Authentication sequence.
    pub auth: AuthConfig,
    /// Action scheduler timing.
    pub actions: ActionConfig,
    /// Remote status query.
    pub status: StatusConfig,
    /// Proxy list handling.
    pub proxies: ProxyConfig,
    /// Simulated driver.
    pub sim: SimConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_server: "localhost:25565".into(),
            driver: DriverKind::default(),
            accounts_path: PathBuf::from("accounts.json"),
            proxies_path: PathBuf::from("proxies.txt"),
            logs_dir: PathBuf::from("logs"),
            chatlog_path: PathBuf::from("chatlog.txt"),
            ipc_name: "mc-herd".into(),
            ipc_enabled: true,
            reconnect: ReconnectConfig::default(),
            auth: AuthConfig::default(),
            actions: ActionConfig::default(),
            status: StatusConfig::default(),
            proxies: ProxyConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Status query timeout as a [`Duration`].
    #[must_use]
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.actions.tick_ms == 0 {
            return Err(AppError::Config(
                "actions.tick_ms must be greater than zero".into(),
            ));
        }

        if self.actions.hold_min_ms >= self.actions.hold_max_ms {
            return Err(AppError::Config(format!(
                "actions.hold_min_ms ({}) must be below actions.hold_max_ms ({})",
                self.actions.hold_min_ms, self.actions.hold_max_ms
            )));
        }

        if !(0.0..=1.0).contains(&self.actions.spam_probability) {
            return Err(AppError::Config(
                "actions.spam_probability must be within [0, 1]".into(),
            ));
        }

        if self.status.timeout_ms == 0 {
            return Err(AppError::Config(
                "status.timeout_ms must be greater than zero".into(),
            ));
        }

        if self.ipc_enabled && self.ipc_name.trim().is_empty() {
            return Err(AppError::Config(
                "ipc_name must not be empty when ipc is enabled".into(),
            ));
        }

        Ok(())
    }
}
