//! CFW-11 serial watchdog heartbeat: a periodic FC03 read of P0680 keeps
//! the drive's communication-loss timer (P0314/A128) from tripping when the
//! HMI itself goes quiet.

use std::time::{Duration, Instant};

use modbus_proto::frame::{self, Request};

/// The CFW-11 register polled purely to keep the watchdog alive; its value
/// is never translated back to the HMI.
pub const P0680_SERIAL_WATCHDOG: u16 = 680;

/// Default heartbeat interval when none is configured (500 ms, matching the
/// original's `heartbeat_interval_s=0.5` default).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Number of consecutive failed heartbeats after which the log level is
/// downgraded from WARN to DEBUG, so a WEG port that's simply unplugged
/// doesn't spam the log forever.
pub const WARN_DOWNGRADE_THRESHOLD: u32 = 5;

/// Every Nth successful heartbeat also logs a one-line status summary.
pub const STATUS_SUMMARY_PERIOD: u64 = 10;

pub struct HeartbeatScheduler {
    weg_slave_id: u8,
    interval: Duration,
    last_sent: Option<Instant>,
    /// Streak of failures since the last success; drives the WARN→DEBUG
    /// downgrade.
    consecutive_failures: u32,
    /// Cumulative attempts, successes, and failures. Updated regardless of
    /// outcome, unlike `consecutive_failures` which resets on success.
    sent: u64,
    ok: u64,
    fail: u64,
}

/// What the caller should do this tick.
#[derive(Debug, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Not due yet.
    Wait,
    /// Send this frame and call [`HeartbeatScheduler::record_result`] with
    /// the outcome once a response (or timeout) is known.
    Send(Vec<u8>),
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeartbeatOutcome {
    pub severity_is_warn: bool,
    pub log_status_summary: bool,
}

impl HeartbeatScheduler {
    pub fn new(weg_slave_id: u8, interval: Duration) -> Self {
        Self {
            weg_slave_id,
            interval,
            last_sent: None,
            consecutive_failures: 0,
            sent: 0,
            ok: 0,
            fail: 0,
        }
    }

    /// Whether a heartbeat read should be sent right now, given `now`.
    pub fn poll(&mut self, now: Instant) -> HeartbeatAction {
        let due = match self.last_sent {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if !due {
            return HeartbeatAction::Wait;
        }
        self.last_sent = Some(now);
        self.sent += 1;
        let frame = frame::encode_request(
            self.weg_slave_id,
            &Request::ReadHolding {
                addr: P0680_SERIAL_WATCHDOG,
                count: 1,
            },
        );
        HeartbeatAction::Send(frame)
    }

    /// Record the result of the most recently sent heartbeat. Updates the
    /// cumulative `ok`/`fail` counters regardless of outcome. Returns
    /// whether this failure should log at WARN (still below the downgrade
    /// threshold) or DEBUG, and whether a status summary line is due this
    /// round.
    pub fn record_result(&mut self, succeeded: bool) -> HeartbeatOutcome {
        if succeeded {
            self.consecutive_failures = 0;
            self.ok += 1;
            return HeartbeatOutcome {
                severity_is_warn: false,
                log_status_summary: self.ok % STATUS_SUMMARY_PERIOD == 0,
            };
        }

        self.consecutive_failures += 1;
        self.fail += 1;
        HeartbeatOutcome {
            severity_is_warn: self.consecutive_failures <= WARN_DOWNGRADE_THRESHOLD,
            log_status_summary: false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Total heartbeats attempted (sent), regardless of outcome.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Total heartbeats that got a well-formed response.
    pub fn ok(&self) -> u64 {
        self.ok
    }

    /// Total heartbeats that timed out or got a malformed response.
    pub fn fail(&self) -> u64 {
        self.fail
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_poll_is_always_due() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        match sched.poll(Instant::now()) {
            HeartbeatAction::Send(frame) => {
                assert!(modbus_proto::crc::verify(&frame));
            }
            HeartbeatAction::Wait => panic!("expected first poll to be due"),
        }
    }

    #[test]
    fn poll_waits_until_interval_elapses() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        let t0 = Instant::now();
        sched.poll(t0);
        assert_eq!(sched.poll(t0 + Duration::from_millis(10)), HeartbeatAction::Wait);
    }

    #[test]
    fn poll_fires_again_after_interval() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        let t0 = Instant::now();
        sched.poll(t0);
        match sched.poll(t0 + DEFAULT_HEARTBEAT_INTERVAL) {
            HeartbeatAction::Send(_) => {}
            HeartbeatAction::Wait => panic!("expected a second heartbeat after the interval"),
        }
    }

    #[test]
    fn failures_downgrade_to_debug_after_threshold() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        for _ in 0..WARN_DOWNGRADE_THRESHOLD {
            let outcome = sched.record_result(false);
            assert!(outcome.severity_is_warn);
        }
        let outcome = sched.record_result(false);
        assert!(!outcome.severity_is_warn);
    }

    #[test]
    fn success_resets_failure_count() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        sched.record_result(false);
        sched.record_result(false);
        sched.record_result(true);
        assert_eq!(sched.consecutive_failures(), 0);
    }

    #[test]
    fn sent_counts_every_poll_regardless_of_outcome() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        let t0 = Instant::now();
        sched.poll(t0);
        sched.record_result(false);
        sched.poll(t0 + DEFAULT_HEARTBEAT_INTERVAL);
        sched.record_result(true);
        assert_eq!(sched.sent(), 2);
        assert_eq!(sched.ok(), 1);
        assert_eq!(sched.fail(), 1);
    }

    #[test]
    fn fail_count_does_not_reset_on_success() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        sched.record_result(false);
        sched.record_result(false);
        sched.record_result(true);
        assert_eq!(sched.fail(), 2);
        assert_eq!(sched.consecutive_failures(), 0);
    }

    #[test]
    fn status_summary_logs_every_tenth_success() {
        let mut sched = HeartbeatScheduler::new(0x01, DEFAULT_HEARTBEAT_INTERVAL);
        let mut summary_count = 0;
        for _ in 0..20 {
            if sched.record_result(true).log_status_summary {
                summary_count += 1;
            }
        }
        assert_eq!(summary_count, 2);
    }
}
