//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one rule file per Bluetooth hardware id
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Input device directory (watched for hot-plug, holds event nodes)
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,

    /// Kernel input device registry
    #[serde(default = "default_registry")]
    pub registry: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            device_dir: default_device_dir(),
            registry: default_registry(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/mnt/onboard/.btpt")
}

fn default_device_dir() -> PathBuf {
    PathBuf::from("/dev/input")
}

fn default_registry() -> PathBuf {
    PathBuf::from("/proc/bus/input/devices")
}

/// Dispatch loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum time to wait for device input per iteration, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Keep the Bluetooth heartbeat going this long after the last matched
    /// event, in seconds
    #[serde(default = "default_heartbeat_idle_secs")]
    pub heartbeat_idle_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_idle_secs: default_heartbeat_idle_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_heartbeat_idle_secs() -> u64 {
    10 * 60
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
