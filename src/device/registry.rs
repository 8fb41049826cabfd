//! Device discovery
//!
//! Discovery reads the kernel's textual input device registry
//! (`/proc/bus/input/devices`), one record per connected device:
//!
//! ```text
//! I: Bus=0005 Vendor=05ac Product=022c Version=011b
//! N: Name="Page Turner"
//! U: Uniq=aa:bb:cc:dd:ee:ff
//! H: Handlers=kbd event3
//!
//! I: Bus=0019 Vendor=0000 Product=0001 Version=0000
//! ...
//! ```
//!
//! Only Bluetooth records (`Bus=0005`) are considered. For each `eventN`
//! handler of such a record the device is acquired when a rule file named
//! after its `Uniq=` id exists in the config directory and the event stream
//! node can be opened. Scanning is idempotent: ids already tracked are skipped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use super::error::{DeviceError, Result};
use super::{Device, DeviceConfig, DeviceId};

/// Registry bus id of Bluetooth devices
pub const BUS_BLUETOOTH: &str = "0005";

/// Prefix of handlers that expose an event stream
pub const EVENT_HANDLER_PREFIX: &str = "event";

/// Filesystem locations used by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    /// Textual device registry
    pub registry: PathBuf,
    /// Directory holding one rule file per hardware id
    pub config_dir: PathBuf,
    /// Directory holding event stream nodes
    pub device_dir: PathBuf,
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("/proc/bus/input/devices"),
            config_dir: PathBuf::from("/mnt/onboard/.btpt"),
            device_dir: PathBuf::from("/dev/input"),
        }
    }
}

/// One record of the device registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRecord {
    /// Text of the `I:` line after the prefix
    pub info: String,
    /// `Bus=` value of the `I:` line
    pub bus: Option<String>,
    /// `Uniq=` value of the `U:` line
    pub uniq: Option<String>,
    /// Tokens of the `H: Handlers=` line
    pub handlers: Vec<String>,
}

impl RegistryRecord {
    /// Split registry text into records
    pub fn parse_all(text: &str) -> Vec<RegistryRecord> {
        let mut records = Vec::new();
        let mut current: Option<RegistryRecord> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                records.extend(current.take());
                continue;
            }

            let record = current.get_or_insert_with(RegistryRecord::default);
            let Some((kind, rest)) = line.split_once(": ") else {
                continue;
            };

            match kind {
                "I" => {
                    record.info = rest.trim().to_string();
                    record.bus = rest
                        .split_whitespace()
                        .find_map(|field| field.strip_prefix("Bus="))
                        .map(str::to_string);
                }
                "U" => {
                    record.uniq = rest.strip_prefix("Uniq=").map(|u| u.trim().to_string());
                }
                "H" => {
                    if let Some(handlers) = rest.strip_prefix("Handlers=") {
                        record.handlers = handlers.split_whitespace().map(str::to_string).collect();
                    }
                }
                _ => {}
            }
        }

        records.extend(current);
        records
    }

    /// True for Bluetooth bus records
    pub fn is_bluetooth(&self) -> bool {
        self.bus.as_deref() == Some(BUS_BLUETOOTH)
    }

    /// Normalized hardware id, if the record has a non-empty one
    pub fn device_id(&self) -> Option<DeviceId> {
        self.uniq
            .as_deref()
            .map(DeviceId::new)
            .filter(|id| !id.is_empty())
    }

    /// Handlers exposing an event stream (`event3`, ...)
    pub fn event_handlers(&self) -> impl Iterator<Item = &str> {
        self.handlers
            .iter()
            .map(String::as_str)
            .filter(|h| h.starts_with(EVENT_HANDLER_PREFIX))
    }
}

/// Set of tracked devices, keyed by hardware id
///
/// Owned by the dispatch loop; never shared across threads.
#[derive(Debug)]
pub struct DeviceRegistry {
    paths: DevicePaths,
    devices: HashMap<DeviceId, Device>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new(paths: DevicePaths) -> Self {
        Self {
            paths,
            devices: HashMap::new(),
        }
    }

    /// Configured locations
    pub fn paths(&self) -> &DevicePaths {
        &self.paths
    }

    /// Scan the device registry and acquire new devices
    ///
    /// Returns true if at least one device was added.
    pub fn scan(&mut self) -> bool {
        debug!("Checking {} for new devices", self.paths.registry.display());

        let text = match fs::read_to_string(&self.paths.registry) {
            Ok(text) => text,
            Err(source) => {
                let err = DeviceError::RegistryUnreadable {
                    path: self.paths.registry.clone(),
                    source,
                };
                warn!(kind = ?err.kind(), "{}", err);
                return false;
            }
        };

        let added = self.scan_records(&RegistryRecord::parse_all(&text));
        debug!("Devices scanned, {} tracked", self.devices.len());
        added
    }

    /// Acquire devices from already parsed records
    pub fn scan_records(&mut self, records: &[RegistryRecord]) -> bool {
        let mut added = false;

        for record in records {
            if !record.is_bluetooth() {
                trace!("Skipping {}", record.info);
                continue;
            }

            let Some(id) = record.device_id() else {
                debug!("Skipping {}: no hardware id", record.info);
                continue;
            };

            debug!("Found {}", record.info);

            for handler in record.event_handlers() {
                if self.devices.contains_key(&id) {
                    continue;
                }

                match self.acquire(&id, handler) {
                    Ok(device) => {
                        info!(
                            "Acquired device {}: {} ({} rules)",
                            handler,
                            id,
                            device.config().len()
                        );
                        self.devices.insert(id.clone(), device);
                        added = true;
                    }
                    Err(e) => {
                        warn!(kind = ?e.kind(), device = %id, handler, "{}", e);
                    }
                }
            }
        }

        added
    }

    fn acquire(&self, id: &DeviceId, handler: &str) -> Result<Device> {
        let config_path = self.find_config(id)?;
        let text =
            fs::read_to_string(&config_path).map_err(|source| DeviceError::ConfigUnreadable {
                path: config_path.clone(),
                source,
            })?;

        let stream = Device::open_stream(&self.paths.device_dir.join(handler))?;
        let config = DeviceConfig::parse(&text)?;

        Ok(Device::new(id.clone(), handler, stream, config))
    }

    /// Find the rule file for `id`, comparing names case-insensitively
    ///
    /// Names are compared as-is against the normalized id. If several files
    /// differ only in case, the last in sorted order is used.
    pub fn find_config(&self, id: &DeviceId) -> Result<PathBuf> {
        let dir = &self.paths.config_dir;
        let entries = fs::read_dir(dir).map_err(|source| DeviceError::ConfigUnreadable {
            path: dir.clone(),
            source,
        })?;

        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| !path.is_dir() && names_device(path, id))
            .max()
            .ok_or_else(|| DeviceError::ConfigNotFound {
                id: id.clone(),
                dir: dir.clone(),
            })
    }

    /// Stop tracking a device; its stream is closed on drop
    pub fn remove(&mut self, id: &DeviceId) -> Option<Device> {
        self.devices.remove(id)
    }

    /// Tracked device by id
    pub fn get(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Tracked device by id
    pub fn get_mut(&mut self, id: &DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(id)
    }

    /// True if `id` is tracked
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    /// Number of tracked devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True if no device is tracked
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Tracked devices, in no particular order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }
}

fn names_device(path: &Path, id: &DeviceId) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case(id.as_str()))
}
