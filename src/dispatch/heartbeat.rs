//! Bluetooth heartbeat policy
//!
//! The host turns Bluetooth off after a period without heartbeats. While the
//! page turner is in use (a rule matched within the idle threshold) the loop
//! beats once per iteration; after that the heartbeat is left to lapse. The
//! heartbeat object is created on first use and kept for the process lifetime.

use std::time::{Duration, Instant};

use crate::host::{Heartbeat, HostServices};

/// Default idle threshold (10 minutes)
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Decides when to beat the heartbeat
pub struct HeartbeatPolicy {
    idle_threshold: Duration,
    last_match: Option<Instant>,
    heartbeat: Option<Box<dyn Heartbeat>>,
}

impl HeartbeatPolicy {
    /// Create a policy with the given idle threshold
    pub fn new(idle_threshold: Duration) -> Self {
        Self {
            idle_threshold,
            last_match: None,
            heartbeat: None,
        }
    }

    /// Record a rule match now
    pub fn record_match(&mut self) {
        self.record_match_at(Instant::now());
    }

    /// Record a rule match at `at`
    pub fn record_match_at(&mut self, at: Instant) {
        self.last_match = Some(at);
    }

    /// Time of the most recent match
    pub fn last_match(&self) -> Option<Instant> {
        self.last_match
    }

    /// True once the heartbeat object exists
    pub fn is_started(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Run the policy for one loop iteration
    pub fn tick<H: HostServices + ?Sized>(&mut self, host: &H) -> bool {
        self.tick_at(Instant::now(), host)
    }

    /// Run the policy as of `now`; returns true if a beat was sent
    pub fn tick_at<H: HostServices + ?Sized>(&mut self, now: Instant, host: &H) -> bool {
        let Some(last) = self.last_match else {
            return false;
        };

        if now.saturating_duration_since(last) >= self.idle_threshold {
            return false;
        }

        self.heartbeat
            .get_or_insert_with(|| host.create_heartbeat())
            .beat();
        true
    }
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MockHeartbeat, MockHostServices};

    fn host_with_beats(beats: usize) -> MockHostServices {
        let mut host = MockHostServices::new();
        host.expect_create_heartbeat().times(1).returning(move || {
            let mut heartbeat = MockHeartbeat::new();
            heartbeat.expect_beat().times(beats).return_const(());
            Box::new(heartbeat)
        });
        host
    }

    #[test]
    fn test_no_beat_without_match() {
        let mut host = MockHostServices::new();
        host.expect_create_heartbeat().never();

        let mut policy = HeartbeatPolicy::default();
        assert!(!policy.tick(&host));
        assert!(!policy.is_started());
    }

    #[test]
    fn test_beat_every_iteration_while_active() {
        let host = host_with_beats(3);
        let mut policy = HeartbeatPolicy::default();
        let start = Instant::now();
        policy.record_match_at(start);

        assert!(policy.tick_at(start, &host));
        assert!(policy.tick_at(start + Duration::from_secs(1), &host));
        assert!(policy.tick_at(start + Duration::from_secs(599), &host));
        assert!(policy.is_started());
    }

    #[test]
    fn test_heartbeat_lapses_after_threshold() {
        let host = host_with_beats(1);
        let mut policy = HeartbeatPolicy::default();
        let start = Instant::now();
        policy.record_match_at(start);

        assert!(policy.tick_at(start, &host));
        assert!(!policy.tick_at(start + Duration::from_secs(600), &host));
        assert!(!policy.tick_at(start + Duration::from_secs(3600), &host));
        // kept, not torn down
        assert!(policy.is_started());
    }

    #[test]
    fn test_new_match_resumes_beats() {
        let host = host_with_beats(2);
        let mut policy = HeartbeatPolicy::new(Duration::from_secs(10));
        let start = Instant::now();
        policy.record_match_at(start);

        assert!(policy.tick_at(start, &host));
        assert!(!policy.tick_at(start + Duration::from_secs(20), &host));

        policy.record_match_at(start + Duration::from_secs(30));
        assert!(policy.tick_at(start + Duration::from_secs(31), &host));
    }
}
