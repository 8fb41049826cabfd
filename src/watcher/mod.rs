//! Input directory change notification
//!
//! A watcher thread observes the input device directory with inotify and,
//! for every batch of changes, bumps a shared change counter and wakes the
//! dispatch loop. It never scans or touches the device table itself.
//!
//! ```text
//! watcher thread                        dispatch loop
//! ━━━━━━━━━━━━━━                        ━━━━━━━━━━━━━
//! read_events_blocking()
//!   └─> RescanSignal::notify() ──wake──> wait_pending() / take_pending()
//!                                          └─> DeviceRegistry::scan()
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use inotify::{Inotify, WatchMask};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace};

/// Pending-change counter shared between the watcher and the dispatch loop
///
/// Any number of notifications collapse into one rescan: consumers reset the
/// counter to zero when they take it.
#[derive(Debug, Clone, Default)]
pub struct RescanSignal {
    inner: Arc<SignalState>,
}

#[derive(Debug, Default)]
struct SignalState {
    changes: Mutex<u64>,
    wake: Condvar,
}

impl RescanSignal {
    /// Create a signal with no pending change
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change and wake the waiting loop
    pub fn notify(&self) {
        let mut changes = self.inner.changes.lock();
        *changes += 1;
        self.inner.wake.notify_all();
    }

    /// Consume pending changes without blocking
    ///
    /// Returns true if at least one change was pending.
    pub fn take_pending(&self) -> bool {
        let mut changes = self.inner.changes.lock();
        std::mem::take(&mut *changes) > 0
    }

    /// Block until a change is pending, then consume it
    pub fn wait_pending(&self) {
        let mut changes = self.inner.changes.lock();
        while *changes == 0 {
            self.inner.wake.wait(&mut changes);
        }
        *changes = 0;
    }

    /// Number of changes not yet consumed
    pub fn pending(&self) -> u64 {
        *self.inner.changes.lock()
    }
}

/// Watches the input device directory for hot-plug changes
pub struct InputDirWatcher {
    path: PathBuf,
    handle: JoinHandle<()>,
}

impl InputDirWatcher {
    /// Start watching `path`, notifying `signal` on every change
    ///
    /// The watch is registered before the thread starts so setup failures
    /// are reported to the caller.
    pub fn spawn(path: &Path, signal: RescanSignal) -> Result<Self> {
        let inotify = Inotify::init().context("Failed to initialize inotify")?;

        let mask = WatchMask::CREATE
            | WatchMask::DELETE
            | WatchMask::MOVED_TO
            | WatchMask::MOVED_FROM
            | WatchMask::ATTRIB;
        inotify
            .watches()
            .add(path, mask)
            .with_context(|| format!("Failed to watch {}", path.display()))?;

        let watched = path.to_path_buf();
        let handle = thread::Builder::new()
            .name("input-dir-watcher".to_string())
            .spawn(move || watch_loop(inotify, &watched, &signal))
            .context("Failed to spawn input directory watcher")?;

        info!("Watching {} for input device changes", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            handle,
        })
    }

    /// Watched directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while the watcher thread is alive
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

fn watch_loop(mut inotify: Inotify, path: &Path, signal: &RescanSignal) {
    let mut buffer = [0u8; 4096];

    loop {
        let events = match inotify.read_events_blocking(&mut buffer) {
            Ok(events) => events,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Stopped watching {}: {}", path.display(), e);
                return;
            }
        };

        let mut changed = 0usize;
        for event in events {
            trace!("{:?} {:?}", event.mask, event.name);
            changed += 1;
        }

        if changed > 0 {
            debug!("{} changed ({} events)", path.display(), changed);
            signal.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_take_pending_resets_counter() {
        let signal = RescanSignal::new();
        assert!(!signal.take_pending());

        signal.notify();
        signal.notify();
        assert_eq!(signal.pending(), 2);
        assert!(signal.take_pending());
        assert_eq!(signal.pending(), 0);
        assert!(!signal.take_pending());
    }

    #[test]
    fn test_wait_pending_wakes_on_notify() {
        let signal = RescanSignal::new();
        let notifier = signal.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            notifier.notify();
        });

        signal.wait_pending();
        assert_eq!(signal.pending(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_pending_returns_if_already_pending() {
        let signal = RescanSignal::new();
        signal.notify();
        signal.wait_pending();
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn test_watcher_signals_on_new_node() {
        let dir = TempDir::new().unwrap();
        let signal = RescanSignal::new();
        let watcher = InputDirWatcher::spawn(dir.path(), signal.clone()).unwrap();
        assert!(watcher.is_running());
        assert_eq!(watcher.path(), dir.path());

        std::fs::write(dir.path().join("event7"), b"").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while signal.pending() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(signal.take_pending());
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let signal = RescanSignal::new();
        assert!(InputDirWatcher::spawn(Path::new("/nonexistent/input"), signal).is_err());
    }
}
