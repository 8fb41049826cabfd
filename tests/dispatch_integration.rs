//! End-to-end dispatch tests over a fake device tree
//!
//! Event nodes are regular files holding pre-encoded records; a file at EOF
//! reads short, which the loop treats as a disconnect.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use bt_page_turner::device::{DeviceId, DevicePaths, DeviceRegistry, InputEvent};
use bt_page_turner::dispatch::{DispatchLoop, DispatchSettings, LoopState};
use bt_page_turner::host::{Heartbeat, HostCall, HostServices};
use bt_page_turner::watcher::RescanSignal;
use parking_lot::Mutex;
use tempfile::TempDir;

type CallLog = Arc<Mutex<Vec<HostCall>>>;

struct RecordingHost {
    calls: CallLog,
    reading_view: bool,
}

impl RecordingHost {
    fn new(reading_view: bool) -> Self {
        Self {
            calls: CallLog::default(),
            reading_view,
        }
    }

    fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }
}

struct RecordingHeartbeat(CallLog);

impl Heartbeat for RecordingHeartbeat {
    fn beat(&mut self) {
        self.0.lock().push(HostCall::Heartbeat);
    }
}

impl HostServices for RecordingHost {
    fn foreground_is_reading_view(&self) -> bool {
        self.reading_view
    }

    fn invoke_action(&self, action: &str) {
        self.calls.lock().push(HostCall::Action(action.to_string()));
    }

    fn notify_activity(&self) {
        self.calls.lock().push(HostCall::Activity);
    }

    fn create_heartbeat(&self) -> Box<dyn Heartbeat> {
        Box::new(RecordingHeartbeat(self.calls.clone()))
    }
}

struct Fixture {
    _root: TempDir,
    paths: DevicePaths,
}

impl Fixture {
    fn new(registry: &str) -> Self {
        let root = TempDir::new().unwrap();
        let paths = DevicePaths {
            registry: root.path().join("devices"),
            config_dir: root.path().join("btpt"),
            device_dir: root.path().join("input"),
        };
        fs::create_dir(&paths.config_dir).unwrap();
        fs::create_dir(&paths.device_dir).unwrap();
        fs::write(&paths.registry, registry).unwrap();

        Self { _root: root, paths }
    }

    fn rules(&self, name: &str, text: &str) {
        fs::write(self.paths.config_dir.join(name), text).unwrap();
    }

    fn node(&self, handler: &str, bytes: &[u8]) {
        fs::write(self.paths.device_dir.join(handler), bytes).unwrap();
    }

    fn dispatch(&self, host: RecordingHost) -> DispatchLoop<RecordingHost> {
        let signal = RescanSignal::new();
        signal.notify();

        let settings = DispatchSettings {
            poll_interval: Duration::from_millis(10),
            ..DispatchSettings::default()
        };
        DispatchLoop::new(DeviceRegistry::new(self.paths.clone()), signal, host, settings)
    }
}

const ONE_DEVICE: &str = "\
I: Bus=0005 Vendor=05ac Product=022c Version=011b
N: Name=\"Page Remote\"
U: Uniq=AA:BB:CC
H: Handlers=sysrq kbd event3
";

const TWO_DEVICES: &str = "\
I: Bus=0005 Vendor=05ac Product=022c Version=011b
U: Uniq=AA:BB:CC
H: Handlers=kbd event3

I: Bus=0005 Vendor=046d Product=b012 Version=0001
U: Uniq=11:22:33
H: Handlers=mouse0 event4
";

#[test]
fn test_event_fires_action_and_activity() {
    let fixture = Fixture::new(ONE_DEVICE);
    fixture.rules("aabbcc", "nextPage 1 30 1\n");
    fixture.node("event3", &InputEvent::new(1, 30, 1).encode());

    let mut dispatch = fixture.dispatch(RecordingHost::new(true));
    let report = dispatch.run_once();

    assert!(report.devices_added);
    assert_eq!(report.events, 1);
    assert_eq!(
        dispatch.host().calls(),
        vec![HostCall::Activity, HostCall::Action("nextPage".into())]
    );
    assert!(dispatch.heartbeat().last_match().is_some());
}

#[test]
fn test_every_matching_rule_fires() {
    let fixture = Fixture::new(ONE_DEVICE);
    fixture.rules("AABBCC", "nextPage 1 30 1\nflash EV_KEY KEY_A 1\nprevPage 1 31 1\n");
    fixture.node("event3", &InputEvent::new(1, 30, 1).encode());

    let mut dispatch = fixture.dispatch(RecordingHost::new(true));
    let report = dispatch.run_once();

    assert_eq!(report.actions, 2);
    assert_eq!(
        dispatch.host().calls(),
        vec![
            HostCall::Activity,
            HostCall::Action("nextPage".into()),
            HostCall::Activity,
            HostCall::Action("flash".into()),
        ]
    );
}

#[test]
fn test_outside_reading_view_only_activity() {
    let fixture = Fixture::new(ONE_DEVICE);
    fixture.rules("AABBCC", "nextPage 1 30 1\n");
    fixture.node("event3", &InputEvent::new(1, 30, 1).encode());

    let mut dispatch = fixture.dispatch(RecordingHost::new(false));
    dispatch.run_once();

    assert_eq!(dispatch.host().calls(), vec![HostCall::Activity]);
}

#[test]
fn test_short_read_drops_only_that_device() {
    let fixture = Fixture::new(TWO_DEVICES);
    fixture.rules("AABBCC", "nextPage 1 30 1\n");
    fixture.rules("112233", "prevPage 1 31 1\n");
    fixture.node("event3", &InputEvent::new(1, 30, 1).encode());
    fixture.node("event4", &[0u8; 3]);

    let mut dispatch = fixture.dispatch(RecordingHost::new(true));
    let report = dispatch.run_once();

    assert_eq!(report.lost, vec![DeviceId::new("112233")]);
    assert_eq!(report.actions, 1);
    assert!(dispatch.registry().contains(&DeviceId::new("AABBCC")));
    assert_eq!(dispatch.registry().len(), 1);
    assert_eq!(dispatch.state(), LoopState::Polling);
}

#[test]
fn test_disconnect_record_drops_device() {
    let fixture = Fixture::new(ONE_DEVICE);
    fixture.rules("AABBCC", "nextPage 1 30 1\n");
    fixture.node("event3", &InputEvent::new(0, 0, 1).encode());

    let mut dispatch = fixture.dispatch(RecordingHost::new(true));
    let report = dispatch.run_once();

    assert_eq!(report.lost, vec![DeviceId::new("AABBCC")]);
    assert!(dispatch.host().calls().is_empty());
    assert_eq!(dispatch.state(), LoopState::WaitForAnyDevice);
}

#[test]
fn test_heartbeat_follows_match() {
    let fixture = Fixture::new(ONE_DEVICE);
    fixture.rules("AABBCC", "nextPage 1 30 1\n");
    let mut bytes = InputEvent::new(1, 30, 1).encode().to_vec();
    bytes.extend_from_slice(&InputEvent::new(1, 30, 0).encode());
    fixture.node("event3", &bytes);

    let mut dispatch = fixture.dispatch(RecordingHost::new(true));
    dispatch.run_once();
    let report = dispatch.run_once();

    assert!(report.heartbeat);
    assert_eq!(report.actions, 0);
    assert_eq!(
        dispatch.host().calls(),
        vec![
            HostCall::Activity,
            HostCall::Action("nextPage".into()),
            HostCall::Heartbeat,
        ]
    );
}

#[test]
fn test_scan_is_idempotent() {
    let fixture = Fixture::new(TWO_DEVICES);
    fixture.rules("AABBCC", "nextPage 1 30 1\n");
    fixture.node("event3", &[]);

    let mut registry = DeviceRegistry::new(fixture.paths.clone());
    assert!(registry.scan());
    assert!(!registry.scan());
    assert_eq!(registry.len(), 1);

    // second device gains a rule file and a node later
    fixture.rules("112233", "prevPage 1 31 1\n");
    fixture.node("event4", &[]);
    assert!(registry.scan());
    assert_eq!(registry.len(), 2);
}
