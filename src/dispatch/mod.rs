//! Dispatch loop
//!
//! The always-running engine. Each iteration:
//!
//! 1. **Wait / rescan**: with no tracked device, block until the watcher
//!    signals a change; with a pending change, rescan the device registry.
//! 2. **Heartbeat**: run the [`HeartbeatPolicy`].
//! 3. **Poll**: wait up to the poll interval for any tracked descriptor to be
//!    readable, read one record from each ready device and fire every rule
//!    that matches it.
//!
//! # States
//!
//! ```text
//!                    wake
//! WaitForAnyDevice ───────> RescanPending ──(table non-empty)──> Polling
//!        ^                       │   ^                              │
//!        └─(nothing, still empty)┘   └──────(change pending)────────┘
//! ```
//!
//! There is no terminal state. Device errors drop only the affected device,
//! which is picked up again by a later rescan.

use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info, trace, warn};

use crate::device::{DeviceConfig, DeviceError, DeviceId, DeviceRegistry, InputEvent, ReadOutcome};
use crate::host::{self, HostServices};
use crate::watcher::RescanSignal;

pub mod heartbeat;

pub use heartbeat::{HeartbeatPolicy, DEFAULT_IDLE_THRESHOLD};

/// Default bound on the multiplexed read wait
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Longest wait for a descriptor to become readable
    pub poll_interval: Duration,
    /// Heartbeat stops this long after the last matched event
    pub idle_threshold: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

/// State the loop is in at the start of an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No device tracked and no change pending; blocks on the signal
    WaitForAnyDevice,
    /// A directory change is pending; the registry will be rescanned
    RescanPending,
    /// Devices tracked, nothing pending; polls descriptors
    Polling,
}

/// What one iteration did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Registry was rescanned
    pub rescanned: bool,
    /// Rescan added at least one device
    pub devices_added: bool,
    /// Heartbeat was beaten
    pub heartbeat: bool,
    /// Events read from devices
    pub events: usize,
    /// Actions fired (one per matching rule)
    pub actions: usize,
    /// Devices dropped this iteration
    pub lost: Vec<DeviceId>,
}

/// Reads tracked devices and dispatches matching events to the host
pub struct DispatchLoop<H: HostServices> {
    registry: DeviceRegistry,
    signal: RescanSignal,
    host: H,
    heartbeat: HeartbeatPolicy,
    poll_timeout: PollTimeout,
}

impl<H: HostServices> DispatchLoop<H> {
    /// Create a loop over an (initially empty) registry
    pub fn new(
        registry: DeviceRegistry,
        signal: RescanSignal,
        host: H,
        settings: DispatchSettings,
    ) -> Self {
        let poll_ms = u16::try_from(settings.poll_interval.as_millis()).unwrap_or(u16::MAX);

        Self {
            registry,
            signal,
            host,
            heartbeat: HeartbeatPolicy::new(settings.idle_threshold),
            poll_timeout: PollTimeout::from(poll_ms),
        }
    }

    /// Tracked devices
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Host services
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Heartbeat policy
    pub fn heartbeat(&self) -> &HeartbeatPolicy {
        &self.heartbeat
    }

    /// Current state
    pub fn state(&self) -> LoopState {
        if self.signal.pending() > 0 {
            LoopState::RescanPending
        } else if self.registry.is_empty() {
            LoopState::WaitForAnyDevice
        } else {
            LoopState::Polling
        }
    }

    /// Run for the lifetime of the process
    pub fn run(&mut self) -> ! {
        info!("Dispatch loop starting");
        loop {
            self.run_once();
        }
    }

    /// Run a single iteration
    ///
    /// Blocks on the rescan signal if no device is tracked and nothing is
    /// pending, otherwise for at most the poll interval.
    pub fn run_once(&mut self) -> IterationReport {
        let mut report = IterationReport::default();

        report.rescanned = if self.registry.is_empty() {
            if self.signal.pending() == 0 {
                info!("Waiting for input devices");
            }
            self.signal.wait_pending();
            true
        } else {
            self.signal.take_pending()
        };

        if report.rescanned {
            report.devices_added = self.registry.scan();
            if !report.devices_added && self.registry.is_empty() {
                return report;
            }
        }

        report.heartbeat = self.heartbeat.tick(&self.host);

        for id in self.poll_ready() {
            self.service_device(&id, &mut report);
        }

        report
    }

    fn poll_ready(&self) -> Vec<DeviceId> {
        let devices: Vec<_> = self.registry.devices().collect();
        if devices.is_empty() {
            return Vec::new();
        }

        let mut fds: Vec<PollFd<'_>> = devices
            .iter()
            .map(|device| PollFd::new(device.as_fd(), PollFlags::POLLIN))
            .collect();

        match poll(&mut fds, self.poll_timeout) {
            Ok(0) => {
                trace!("Poll timeout");
                return Vec::new();
            }
            Ok(_) => {}
            Err(Errno::EINTR) => return Vec::new(),
            Err(e) => {
                warn!("Polling {} devices failed: {}", devices.len(), e);
                return Vec::new();
            }
        }

        let ready = PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL;
        devices
            .iter()
            .zip(&fds)
            .filter(|(_, fd)| fd.revents().is_some_and(|r| r.intersects(ready)))
            .map(|(device, _)| device.id().clone())
            .collect()
    }

    fn service_device(&mut self, id: &DeviceId, report: &mut IterationReport) {
        let Some(device) = self.registry.get_mut(id) else {
            return;
        };

        let event = match device.read_event() {
            ReadOutcome::Event(event) => event,
            ReadOutcome::Pending => return,
            ReadOutcome::Lost(reason) => {
                let err = DeviceError::DeviceLost {
                    id: id.clone(),
                    reason,
                };
                info!(kind = ?err.kind(), "{}", err);
                self.registry.remove(id);
                report.lost.push(id.clone());
                return;
            }
        };

        report.events += 1;
        trace!(device = %id, ?event, "Input event");
        report.actions += fire_rules(device.config(), &event, &mut self.heartbeat, &self.host);
    }
}

/// Fire every rule of `config` matching `event`, in file order
///
/// The last-match time is recorded once per matching event; the activity
/// notification and the action go out once per matching rule.
pub fn fire_rules<H: HostServices + ?Sized>(
    config: &DeviceConfig,
    event: &InputEvent,
    heartbeat: &mut HeartbeatPolicy,
    host: &H,
) -> usize {
    let mut fired = 0;
    for rule in config.matching(event) {
        if fired == 0 {
            heartbeat.record_match();
        }
        debug!(action = %rule.action, "Rule matched {:?}", event);
        host.notify_activity();
        host::dispatch_action(host, &rule.action);
        fired += 1;
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DevicePaths;
    use crate::host::{MockHeartbeat, MockHostServices};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::fs;
    use tempfile::TempDir;

    const REGISTRY: &str = "\
I: Bus=0005 Vendor=05ac Product=022c Version=011b
U: Uniq=aa:bb:cc
H: Handlers=kbd event3
";

    fn paths(root: &TempDir) -> DevicePaths {
        let paths = DevicePaths {
            registry: root.path().join("devices"),
            config_dir: root.path().join("btpt"),
            device_dir: root.path().join("input"),
        };
        fs::create_dir(&paths.config_dir).unwrap();
        fs::create_dir(&paths.device_dir).unwrap();
        fs::write(&paths.registry, REGISTRY).unwrap();
        paths
    }

    fn quick() -> DispatchSettings {
        DispatchSettings {
            poll_interval: Duration::from_millis(10),
            ..DispatchSettings::default()
        }
    }

    #[test]
    fn test_fire_all_matching_rules() {
        let config = DeviceConfig::parse("next 1 2 3\nprev 1 2 3\nmenu 1 2 4\n").unwrap();
        let mut heartbeat = HeartbeatPolicy::default();

        let mut host = MockHostServices::new();
        let mut seq = Sequence::new();
        host.expect_foreground_is_reading_view().return_const(true);
        host.expect_notify_activity().times(2).return_const(());
        host.expect_invoke_action()
            .with(eq("next"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        host.expect_invoke_action()
            .with(eq("prev"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let fired = fire_rules(&config, &InputEvent::new(1, 2, 3), &mut heartbeat, &host);
        assert_eq!(fired, 2);
        assert!(heartbeat.last_match().is_some());
    }

    #[test]
    fn test_unmatched_event_fires_nothing() {
        let config = DeviceConfig::parse("next 1 2 3\n").unwrap();
        let mut heartbeat = HeartbeatPolicy::default();

        let mut host = MockHostServices::new();
        host.expect_notify_activity().never();
        host.expect_invoke_action().never();

        assert_eq!(
            fire_rules(&config, &InputEvent::new(1, 2, 0), &mut heartbeat, &host),
            0
        );
        assert!(heartbeat.last_match().is_none());
    }

    #[test]
    fn test_outside_reading_view_still_notifies() {
        let config = DeviceConfig::parse("next 1 2 3\n").unwrap();
        let mut heartbeat = HeartbeatPolicy::default();

        let mut host = MockHostServices::new();
        host.expect_foreground_is_reading_view().return_const(false);
        host.expect_notify_activity().times(1).return_const(());
        host.expect_invoke_action().never();

        fire_rules(&config, &InputEvent::new(1, 2, 3), &mut heartbeat, &host);
        assert!(heartbeat.last_match().is_some());
    }

    #[test]
    fn test_rescan_without_devices_returns_early() {
        let root = TempDir::new().unwrap();
        let signal = RescanSignal::new();
        let mut host = MockHostServices::new();
        host.expect_create_heartbeat().never();

        let mut dispatch = DispatchLoop::new(
            DeviceRegistry::new(paths(&root)),
            signal.clone(),
            host,
            quick(),
        );
        assert_eq!(dispatch.state(), LoopState::WaitForAnyDevice);

        signal.notify();
        assert_eq!(dispatch.state(), LoopState::RescanPending);

        let report = dispatch.run_once();
        assert!(report.rescanned);
        assert!(!report.devices_added);
        assert!(!report.heartbeat);
        assert_eq!(dispatch.state(), LoopState::WaitForAnyDevice);
    }

    #[test]
    fn test_event_dispatch_and_device_loss() {
        let root = TempDir::new().unwrap();
        let paths = paths(&root);
        fs::write(paths.config_dir.join("AABBCC"), "nextPage 1 30 1\n").unwrap();
        fs::write(
            paths.device_dir.join("event3"),
            InputEvent::new(1, 30, 1).encode(),
        )
        .unwrap();

        let mut host = MockHostServices::new();
        host.expect_foreground_is_reading_view().return_const(true);
        host.expect_notify_activity().times(1).return_const(());
        host.expect_invoke_action()
            .with(eq("nextPage"))
            .times(1)
            .return_const(());
        host.expect_create_heartbeat().times(1).returning(|| {
            let mut heartbeat = MockHeartbeat::new();
            heartbeat.expect_beat().times(1).return_const(());
            Box::new(heartbeat)
        });

        let signal = RescanSignal::new();
        signal.notify();
        let mut dispatch = DispatchLoop::new(DeviceRegistry::new(paths), signal, host, quick());

        // scan, no match yet so no heartbeat, then the event
        let report = dispatch.run_once();
        assert!(report.devices_added);
        assert!(!report.heartbeat);
        assert_eq!(report.events, 1);
        assert_eq!(report.actions, 1);
        assert_eq!(dispatch.state(), LoopState::Polling);

        // heartbeat now active; stream at EOF is a short read
        let report = dispatch.run_once();
        assert!(report.heartbeat);
        assert_eq!(report.lost, vec![DeviceId::new("aabbcc")]);
        assert!(dispatch.registry().is_empty());
    }
}
