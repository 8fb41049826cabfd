//! Tracked Input Devices
//!
//! A device is tracked once discovery has found, for one Bluetooth hardware
//! id, both a rule file in the config directory and an event stream node that
//! can be opened.
//!
//! # Event Records
//!
//! Event streams deliver fixed-size `struct input_event` records:
//!
//! ```text
//! ┌────────────────────┬───────────┬───────────┬────────────┐
//! │ timeval (ignored)  │ type: u16 │ code: u16 │ value: i32 │
//! └────────────────────┴───────────┴───────────┴────────────┘
//! ```
//!
//! Records are read one per ready descriptor. A short read or the kernel's
//! disconnect sentinel (`EV_SYN`, `SYN_REPORT`, value 1) means the device is
//! gone.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::mem;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

pub mod config;
pub mod error;
pub mod registry;

pub use config::{DeviceConfig, Rule};
pub use error::{DeviceError, ErrorKind, Result, RuleField};
pub use registry::{DevicePaths, DeviceRegistry, RegistryRecord};

/// Size of one event record on this platform
pub const EVENT_RECORD_SIZE: usize = mem::size_of::<libc::input_event>();

const EVENT_HEADER_SIZE: usize = mem::size_of::<libc::timeval>();

/// Normalized hardware id of a device
///
/// Built from the registry's `Uniq=` field or a config file name: `:`
/// separators are removed and hex digits uppercased, so ids compare
/// case-insensitively with plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Normalize a raw hardware id
    pub fn new(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(|c| *c != ':')
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        )
    }

    /// Normalized id text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the raw id had nothing but separators
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Event type
    pub event_type: u16,
    /// Event code
    pub code: u16,
    /// Event value
    pub value: i32,
}

impl InputEvent {
    /// Create an event
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }

    /// Decode a full record; `None` if fewer than [`EVENT_RECORD_SIZE`] bytes
    pub fn decode(record: &[u8]) -> Option<Self> {
        if record.len() < EVENT_RECORD_SIZE {
            return None;
        }
        let body = &record[EVENT_HEADER_SIZE..];
        Some(Self {
            event_type: u16::from_ne_bytes([body[0], body[1]]),
            code: u16::from_ne_bytes([body[2], body[3]]),
            value: i32::from_ne_bytes([body[4], body[5], body[6], body[7]]),
        })
    }

    /// Encode as a record with a zero timestamp
    pub fn encode(&self) -> [u8; EVENT_RECORD_SIZE] {
        let mut record = [0u8; EVENT_RECORD_SIZE];
        let body = &mut record[EVENT_HEADER_SIZE..];
        body[0..2].copy_from_slice(&self.event_type.to_ne_bytes());
        body[2..4].copy_from_slice(&self.code.to_ne_bytes());
        body[4..8].copy_from_slice(&self.value.to_ne_bytes());
        record
    }

    /// Kernel sentinel sent when the device goes away
    pub fn is_disconnect(&self) -> bool {
        self.event_type == 0 && self.code == 0 && self.value == 1
    }
}

/// Result of reading one record from a ready device
#[derive(Debug)]
pub enum ReadOutcome {
    /// A full event arrived
    Event(InputEvent),
    /// Nothing to read after all (EAGAIN / EINTR)
    Pending,
    /// The device is gone
    Lost(String),
}

/// A tracked device
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    handler: String,
    stream: File,
    config: DeviceConfig,
}

impl Device {
    /// Assemble a tracked device from an opened stream and its rules
    pub fn new(id: DeviceId, handler: impl Into<String>, stream: File, config: DeviceConfig) -> Self {
        Self {
            id,
            handler: handler.into(),
            stream,
            config,
        }
    }

    /// Open an event stream read-only and non-blocking
    pub fn open_stream(path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| DeviceError::DeviceUnopenable {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Hardware id
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Handler name the stream was opened from (`event3`)
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Rules loaded for this device
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Read exactly one record
    pub fn read_event(&mut self) -> ReadOutcome {
        let mut record = [0u8; EVENT_RECORD_SIZE];
        match self.stream.read(&mut record) {
            Ok(n) if n < EVENT_RECORD_SIZE => {
                ReadOutcome::Lost(format!("short read ({n} of {EVENT_RECORD_SIZE} bytes)"))
            }
            Ok(_) => match InputEvent::decode(&record) {
                Some(event) if event.is_disconnect() => {
                    ReadOutcome::Lost("disconnect event".to_string())
                }
                Some(event) => ReadOutcome::Event(event),
                None => ReadOutcome::Lost("truncated record".to_string()),
            },
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                ReadOutcome::Pending
            }
            Err(e) => ReadOutcome::Lost(e.to_string()),
        }
    }
}

impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}
