//! # bt-page-turner
//!
//! Turns pages with Bluetooth input devices. Hot-plugged Bluetooth devices
//! are matched against per-device rule files; matching input events invoke
//! named actions on the host application and keep it from going idle.
//!
//! # Architecture
//!
//! ```text
//! bt-page-turner
//!   ├─> InputDirWatcher (inotify on /dev/input, own thread)
//!   │     └─> RescanSignal ──wake──┐
//!   └─> DispatchLoop (main thread) <┘
//!         ├─> DeviceRegistry::scan (/proc/bus/input/devices + rule files)
//!         ├─> HeartbeatPolicy (Bluetooth keep-alive while in use)
//!         └─> poll(2) over tracked devices
//!               └─> DeviceConfig rules ──> HostServices
//! ```
//!
//! # Data Flow
//!
//! **Discovery:** inotify → RescanSignal → DeviceRegistry → tracked devices
//!
//! **Input:** event node → InputEvent → Rule match → activity + action

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Daemon configuration
pub mod config;

/// Tracked devices, rule files and discovery
pub mod device;

/// Dispatch loop and heartbeat policy
pub mod dispatch;

/// Symbolic event code resolution
pub mod event_codes;

/// Host application services (action sink, activity, heartbeat)
pub mod host;

/// Utility functions
pub mod utils;

/// Input directory watcher
pub mod watcher;

pub use config::Config;
pub use device::{DeviceConfig, DeviceId, DevicePaths, DeviceRegistry, InputEvent, Rule};
pub use dispatch::{DispatchLoop, DispatchSettings, HeartbeatPolicy, LoopState};
pub use host::{Heartbeat, HostServices, LineHost};
pub use watcher::{InputDirWatcher, RescanSignal};
