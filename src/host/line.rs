//! Line-oriented host for running as a standalone daemon
//!
//! Host calls are queued on a channel and written by a worker thread, one
//! line per call:
//!
//! ```text
//! action nextPage
//! activity
//! heartbeat
//! ```
//!
//! The dispatch loop only pays for a channel send.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use super::{Heartbeat, HostServices};

/// A call made by the dispatch loop into the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// Named action for the reading view
    Action(String),
    /// Input activity (idle timer reset)
    Activity,
    /// Bluetooth keep-alive
    Heartbeat,
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCall::Action(name) => write!(f, "action {}", name),
            HostCall::Activity => f.write_str("activity"),
            HostCall::Heartbeat => f.write_str("heartbeat"),
        }
    }
}

enum Message {
    Call(HostCall),
    Stop,
}

/// Host that writes every call as a line to a writer
pub struct LineHost {
    tx: Sender<Message>,
    reading_view: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl LineHost {
    /// Start a host writing to `writer`
    pub fn spawn<W>(writer: W) -> io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let worker = thread::Builder::new()
            .name("host-writer".to_string())
            .spawn(move || write_loop(rx, writer))?;

        Ok(Self {
            tx,
            reading_view: Arc::new(AtomicBool::new(true)),
            worker: Some(worker),
        })
    }

    /// Start a host writing to stdout
    pub fn stdout() -> io::Result<Self> {
        Self::spawn(io::stdout())
    }

    /// Set whether the reading view is considered in the foreground
    pub fn set_reading_view(&self, reading: bool) {
        self.reading_view.store(reading, Ordering::Relaxed);
    }

    /// Stop the writer after all queued calls are written
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Message::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Host writer thread panicked");
            }
        }
    }

    fn queue(&self, call: HostCall) {
        send_call(&self.tx, call);
    }
}

impl HostServices for LineHost {
    fn foreground_is_reading_view(&self) -> bool {
        self.reading_view.load(Ordering::Relaxed)
    }

    fn invoke_action(&self, action: &str) {
        self.queue(HostCall::Action(action.to_string()));
    }

    fn notify_activity(&self) {
        self.queue(HostCall::Activity);
    }

    fn create_heartbeat(&self) -> Box<dyn Heartbeat> {
        debug!("Creating Bluetooth heartbeat");
        Box::new(LineHeartbeat {
            tx: self.tx.clone(),
        })
    }
}

struct LineHeartbeat {
    tx: Sender<Message>,
}

impl Heartbeat for LineHeartbeat {
    fn beat(&mut self) {
        send_call(&self.tx, HostCall::Heartbeat);
    }
}

/// Queue `call` for the writer; returns false if the writer has stopped
fn send_call(tx: &Sender<Message>, call: HostCall) -> bool {
    match tx.send(Message::Call(call)) {
        Ok(()) => true,
        Err(e) => {
            if let Message::Call(call) = e.into_inner() {
                warn!("Host writer has stopped, dropping {}", call);
            }
            false
        }
    }
}

fn write_loop<W: Write>(rx: Receiver<Message>, mut writer: W) {
    for message in rx {
        let call = match message {
            Message::Call(call) => call,
            Message::Stop => break,
        };

        if let Err(e) = writeln!(writer, "{}", call).and_then(|_| writer.flush()) {
            warn!("Failed to write host call: {}", e);
        }
    }
}
