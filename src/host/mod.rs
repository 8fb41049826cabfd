//! Host services
//!
//! The dispatch loop never talks to the surrounding application directly.
//! Everything it needs is behind [`HostServices`]:
//!
//! - **Action sink**: run a named action on the foreground view, but only if
//!   that view is the reading view
//! - **Activity notifier**: reset the host's idle/sleep timer
//! - **Heartbeat**: keep the Bluetooth link alive while the reader is in use
//!
//! Host calls are queued; the loop does not wait for them to complete.

use tracing::debug;

pub mod line;

pub use line::{HostCall, LineHost};

/// Keep-alive object created lazily by the heartbeat policy
#[cfg_attr(test, mockall::automock)]
pub trait Heartbeat {
    /// Signal that the link is still in use
    fn beat(&mut self);
}

/// Capabilities the surrounding application provides
#[cfg_attr(test, mockall::automock)]
pub trait HostServices {
    /// True if the current foreground view is the reading view
    fn foreground_is_reading_view(&self) -> bool;

    /// Queue `action` for asynchronous invocation on the foreground view
    fn invoke_action(&self, action: &str);

    /// Reset the host's idle timer
    fn notify_activity(&self);

    /// Construct the heartbeat object
    fn create_heartbeat(&self) -> Box<dyn Heartbeat>;
}

/// Invoke `action` if the reading view is in the foreground
///
/// Returns true if the action was queued.
pub fn dispatch_action<H: HostServices + ?Sized>(host: &H, action: &str) -> bool {
    if !host.foreground_is_reading_view() {
        debug!("Not reading view, dropping {}", action);
        return false;
    }

    debug!("Invoking {}", action);
    host.invoke_action(action);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_dispatch_on_reading_view() {
        let mut host = MockHostServices::new();
        host.expect_foreground_is_reading_view().return_const(true);
        host.expect_invoke_action()
            .with(eq("nextPage"))
            .times(1)
            .return_const(());

        assert!(dispatch_action(&host, "nextPage"));
    }

    #[test]
    fn test_dispatch_elsewhere_is_noop() {
        let mut host = MockHostServices::new();
        host.expect_foreground_is_reading_view().return_const(false);
        host.expect_invoke_action().never();

        assert!(!dispatch_action(&host, "nextPage"));
    }
}
