//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments
//!
//! Every section and field is optional; a missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod types;

pub use types::{DispatchConfig, LoggingConfig, PathsConfig};

use crate::device::DevicePaths;
use crate::dispatch::DispatchSettings;

/// Name of the marker file requesting uninstallation
pub const UNINSTALL_MARKER: &str = "uninstall";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,
    /// Dispatch loop timing
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        if self.dispatch.poll_interval_ms > u64::from(u16::MAX) {
            anyhow::bail!(
                "poll_interval_ms ({}) cannot exceed {}",
                self.dispatch.poll_interval_ms,
                u16::MAX
            );
        }

        if self.dispatch.heartbeat_idle_secs == 0 {
            anyhow::bail!("heartbeat_idle_secs must be greater than 0");
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, config_dir: Option<PathBuf>, device_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = config_dir {
            self.paths.config_dir = dir;
        }
        if let Some(dir) = device_dir {
            self.paths.device_dir = dir;
        }
        self
    }

    /// Locations used by device discovery
    pub fn device_paths(&self) -> DevicePaths {
        DevicePaths {
            registry: self.paths.registry.clone(),
            config_dir: self.paths.config_dir.clone(),
            device_dir: self.paths.device_dir.clone(),
        }
    }

    /// Dispatch loop timing
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            poll_interval: Duration::from_millis(self.dispatch.poll_interval_ms),
            idle_threshold: Duration::from_secs(self.dispatch.heartbeat_idle_secs),
        }
    }

    /// Path of the uninstall marker in the config directory
    pub fn uninstall_marker(&self) -> PathBuf {
        self.paths.config_dir.join(UNINSTALL_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.paths.config_dir, PathBuf::from("/mnt/onboard/.btpt"));
        assert_eq!(config.paths.device_dir, PathBuf::from("/dev/input"));
        assert_eq!(config.dispatch.poll_interval_ms, 1000);
        assert_eq!(config.dispatch.heartbeat_idle_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [paths]
            config_dir = "/tmp/btpt"

            [dispatch]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.config_dir, PathBuf::from("/tmp/btpt"));
        assert_eq!(config.paths.registry, PathBuf::from("/proc/bus/input/devices"));
        assert_eq!(config.dispatch.heartbeat_idle_secs, 600);
        assert_eq!(
            config.dispatch_settings().poll_interval,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.dispatch_settings(),
            DispatchSettings::default()
        );
    }

    #[test]
    fn test_config_validation_zero_poll_interval() {
        let mut config = Config::default();
        config.dispatch.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.dispatch.poll_interval_ms = 70_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_and_marker() {
        let config = Config::default().with_overrides(Some(PathBuf::from("/data/btpt")), None);
        assert_eq!(config.device_paths().config_dir, PathBuf::from("/data/btpt"));
        assert_eq!(config.device_paths().device_dir, PathBuf::from("/dev/input"));
        assert_eq!(config.uninstall_marker(), PathBuf::from("/data/btpt/uninstall"));
    }
}
