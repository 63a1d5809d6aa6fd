//! Two bounded rings the control surface exposes: a general gateway event
//! log, and a separate ring of decoded register accesses. Kept apart
//! because they're read at different rates by different consumers and each
//! gets its own lock, per the concurrency model.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use modbus_proto::decode::DecodedValue;

pub const EVENT_RING_CAPACITY: usize = 100;
pub const DECODED_RING_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The arbitrator saw a frame addressed to us and answered it.
    Request,
    /// A write was translated and queued for the CFW-11.
    Translate,
    /// A heartbeat read to P0680 completed or failed.
    Heartbeat,
    /// A CRC-invalid frame was discarded.
    CrcError,
    /// The WEG-facing port was reopened after a failure.
    Reconnect,
    /// Operating mode changed.
    ModeChange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub sequence: u64,
    pub timestamp: Duration,
    pub severity: Severity,
    pub kind: EventKind,
    pub message: String,
}

/// A fixed-size, overwrite-oldest ring buffer with a monotonic sequence
/// number, so a consumer can ask for "everything after N" without missing
/// entries dropped between polls.
pub struct EventLog {
    entries: VecDeque<Event>,
    next_sequence: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            next_sequence: 0,
            capacity,
        }
    }

    pub fn push(&mut self, severity: Severity, kind: EventKind, message: impl Into<String>) {
        let event = Event {
            sequence: self.next_sequence,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
            severity,
            kind,
            message: message.into(),
        };
        self.next_sequence += 1;
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    /// All entries currently held, oldest first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }

    /// Entries with `sequence > since`, oldest first. If entries were
    /// dropped between polls, the gap in `sequence` values is visible to
    /// the caller rather than silently skipped.
    pub fn since(&self, since: u64) -> Vec<Event> {
        self.entries
            .iter()
            .filter(|e| e.sequence > since)
            .cloned()
            .collect()
    }
}

/// A ring of the most recent decoded register accesses, for the operator
/// to eyeball what the HMI and CFW-11 are actually saying to each other.
pub struct DecodedRing {
    entries: VecDeque<DecodedValue>,
    capacity: usize,
}

impl DecodedRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: DecodedValue) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(value);
    }

    pub fn push_all(&mut self, values: impl IntoIterator<Item = DecodedValue>) {
        for value in values {
            self.push(value);
        }
    }

    pub fn snapshot(&self) -> Vec<DecodedValue> {
        self.entries.iter().cloned().collect()
    }
}
