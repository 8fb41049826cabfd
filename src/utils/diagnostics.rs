//! Startup Diagnostics
//!
//! Logs system information and whether the configured input locations are
//! usable, so permission and path problems show up at startup rather than as
//! silently missing devices.

use std::fs;
use std::path::Path;
use sysinfo::System;
use tracing::{info, warn};

use crate::config::Config;

/// Host summary logged at startup
///
/// Only memory is refreshed; process and CPU tables are never enumerated.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Distribution name and version (`Kobo 4.38`, `Debian 12`, ...)
    pub os: String,
    /// Kernel release
    pub kernel: String,
    /// Hostname
    pub hostname: String,
    /// Total memory in megabytes
    pub memory_mb: u64,
}

impl HostInfo {
    /// Read the host summary
    pub fn gather() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let unknown = || "unknown".to_string();
        let os = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{} {}", name, version),
            (Some(name), None) => name,
            _ => unknown(),
        };

        Self {
            os,
            kernel: System::kernel_version().unwrap_or_else(unknown),
            hostname: System::host_name().unwrap_or_else(unknown),
            memory_mb: sys.total_memory() / 1024 / 1024,
        }
    }

    /// Log the summary on one line
    pub fn log(&self) {
        info!(
            "Host {}: {}, kernel {}, {} MB RAM",
            self.hostname, self.os, self.kernel, self.memory_mb
        );
    }
}

/// Accessibility of one configured path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    /// Exists and can be read
    Readable,
    /// Exists but reading failed (usually permissions)
    Unreadable,
    /// Does not exist
    Missing,
}

/// Check whether `path` (file or directory) can be read
pub fn check_path(path: &Path) -> PathStatus {
    if !path.exists() {
        return PathStatus::Missing;
    }

    let readable = if path.is_dir() {
        fs::read_dir(path).is_ok()
    } else {
        fs::File::open(path).is_ok()
    };

    if readable {
        PathStatus::Readable
    } else {
        PathStatus::Unreadable
    }
}

/// Number of rule files in the config directory
pub fn count_rule_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().is_file())
                .filter(|e| e.file_name() != crate::config::UNINSTALL_MARKER)
                .count()
        })
        .unwrap_or(0)
}

/// Log complete diagnostics on startup
pub fn log_startup_diagnostics(config: &Config) {
    info!("=== Startup Diagnostics ===");

    HostInfo::gather().log();

    info!("=== Input Locations ===");
    for (label, path) in [
        ("Device registry", &config.paths.registry),
        ("Device directory", &config.paths.device_dir),
        ("Config directory", &config.paths.config_dir),
    ] {
        match check_path(path) {
            PathStatus::Readable => info!("  {}: {}", label, path.display()),
            PathStatus::Unreadable => warn!("  {}: {} (not readable)", label, path.display()),
            PathStatus::Missing => warn!("  {}: {} (missing)", label, path.display()),
        }
    }
    info!(
        "  Rule files: {}",
        count_rule_files(&config.paths.config_dir)
    );

    info!("=== Dispatch ===");
    info!("  Poll interval: {} ms", config.dispatch.poll_interval_ms);
    info!("  Heartbeat idle: {} s", config.dispatch.heartbeat_idle_secs);
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));
    #[cfg(debug_assertions)]
    info!("  Build: debug");
    #[cfg(not(debug_assertions))]
    info!("  Build: release");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_host_info_gather() {
        let info = HostInfo::gather();
        assert!(!info.os.is_empty());
        assert!(!info.kernel.is_empty());
        assert!(info.memory_mb > 0);
    }

    #[test]
    fn test_check_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("devices");
        std::fs::write(&file, "").unwrap();

        assert_eq!(check_path(dir.path()), PathStatus::Readable);
        assert_eq!(check_path(&file), PathStatus::Readable);
        assert_eq!(check_path(&dir.path().join("nope")), PathStatus::Missing);
    }

    #[test]
    fn test_count_rule_files_skips_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("AABBCC"), "").unwrap();
        std::fs::write(dir.path().join("uninstall"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(count_rule_files(dir.path()), 1);
        assert_eq!(count_rule_files(&dir.path().join("nope")), 0);
    }
}
