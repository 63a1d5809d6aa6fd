//! Bus-buffer bookkeeping: accumulate bytes as they arrive off the
//! HMI-facing port, scan for a complete, CRC-valid frame addressed to this
//! gateway, and forget stale or oversized garbage the same way a real bus
//! full of interleaved, occasionally foreign traffic would need to be
//! forgotten.
//!
//! Deliberately transport-free (it only ever sees `&[u8]`) so the scheduling
//! logic can be driven from unit tests without a serial port.

use std::time::{Duration, Instant};

use modbus_proto::{crc, frame};

/// Once the buffer exceeds this many bytes without yielding a frame, it's
/// almost certainly garbage (noise, a foreign multi-drop conversation) and
/// is trimmed down rather than allowed to grow without bound.
pub const MAX_BUFFER_LEN: usize = 256;
/// How many trailing bytes survive a trim — enough to still contain the
/// tail of an in-flight frame.
pub const TRIM_KEEP_LEN: usize = 64;
/// A buffer that hasn't grown in this long is abandoned outright; whatever
/// exchange it belonged to is long since finished or timed out upstream.
pub const STALE_TIMEOUT: Duration = Duration::from_millis(500);

/// Accumulates bytes read from the bus and extracts frames addressed to a
/// given slave id (or any id, in promiscuous mode) once a full, CRC-valid
/// frame is present.
#[derive(Debug, Default)]
pub struct BusBuffer {
    bytes: Vec<u8>,
    last_byte_at: Option<Instant>,
}

impl BusBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly read bytes and apply the oversize trim.
    pub fn feed(&mut self, chunk: &[u8], now: Instant) {
        if chunk.is_empty() {
            return;
        }
        self.bytes.extend_from_slice(chunk);
        self.last_byte_at = Some(now);
        self.trim_if_oversized();
    }

    fn trim_if_oversized(&mut self) {
        if self.bytes.len() > MAX_BUFFER_LEN {
            let drop_count = self.bytes.len() - TRIM_KEEP_LEN;
            self.bytes.drain(0..drop_count);
        }
    }

    /// Drop everything if no byte has arrived within [`STALE_TIMEOUT`].
    pub fn expire_if_stale(&mut self, now: Instant) {
        if let Some(last) = self.last_byte_at {
            if now.duration_since(last) >= STALE_TIMEOUT {
                self.bytes.clear();
                self.last_byte_at = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True once the bus has been quiet for at least `threshold` — used to
    /// gate the queued-write/heartbeat transactions so they never collide
    /// with HMI polling.
    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        match self.last_byte_at {
            None => true,
            Some(last) => now.duration_since(last) >= threshold,
        }
    }

    /// Scan for the earliest byte offset that both matches the addressing
    /// predicate and begins a complete, CRC-valid frame. On a match,
    /// everything up to and including the frame is drained from the buffer
    /// and the frame body (CRC stripped) is returned.
    ///
    /// A byte that happens to match the slave id but isn't really a frame
    /// start (coincidental value, or a corrupt frame) is silently skipped
    /// in favor of the next candidate rather than discarding the buffer —
    /// the real frame start may still be later in the same read. If any
    /// candidate in this scan failed CRC, that's reported distinctly so the
    /// caller can emit an ERROR event, even when a later candidate in the
    /// same buffer turns out to be a valid frame for someone else.
    pub fn extract_frame(&mut self, addressed_to_us: impl Fn(u8) -> bool) -> FrameResult {
        let mut start = 0;
        let mut saw_crc_failure = false;
        while start < self.bytes.len() {
            let id = self.bytes[start];
            if !addressed_to_us(id) {
                start += 1;
                continue;
            }

            let remaining = &self.bytes[start..];
            match frame::request_frame_len(remaining) {
                Some(len) if remaining.len() >= len => {
                    let candidate = &remaining[..len];
                    if crc::verify(candidate) {
                        let body = candidate[..len - 2].to_vec();
                        self.bytes.drain(0..start + len);
                        return FrameResult::Frame(body);
                    }
                    saw_crc_failure = true;
                    start += 1;
                }
                Some(_) => {
                    // function code recognized, but not enough bytes yet —
                    // wait for more before giving up on this candidate.
                    break;
                }
                None => {
                    start += 1;
                }
            }
        }
        if saw_crc_failure {
            FrameResult::CrcFailure
        } else {
            FrameResult::Incomplete
        }
    }
}

/// Outcome of one [`BusBuffer::extract_frame`] scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    /// A complete, CRC-valid frame addressed to us (body, CRC stripped).
    Frame(Vec<u8>),
    /// A candidate addressed to us failed CRC verification and was
    /// discarded; the caller should log this, not respond to it.
    CrcFailure,
    /// Nothing conclusive yet: no matching candidate, or one that needs
    /// more bytes before it can be verified.
    Incomplete,
}

#[cfg(test)]
mod test {
    use super::*;

    fn always() -> impl Fn(u8) -> bool {
        |id| id == 0x06
    }

    #[test]
    fn extracts_a_clean_frame() {
        let mut buf = BusBuffer::new();
        let frame = frame::encode_request(0x06, &frame::Request::ReadHolding { addr: 0x20, count: 4 });
        buf.feed(&frame, Instant::now());
        match buf.extract_frame(always()) {
            FrameResult::Frame(body) => assert_eq!(body[0], 0x06),
            other => panic!("expected a frame, got {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn skips_foreign_traffic_interleaved_before_our_frame() {
        let mut buf = BusBuffer::new();
        let mut chunk = vec![0x09, 0x03, 0x00, 0x00, 0x00, 0x01, 0x85, 0xDB];
        let ours = frame::encode_request(0x06, &frame::Request::ReadHolding { addr: 0x20, count: 4 });
        chunk.extend_from_slice(&ours);
        buf.feed(&chunk, Instant::now());
        match buf.extract_frame(always()) {
            FrameResult::Frame(body) => assert_eq!(body[0], 0x06),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn waits_for_more_bytes_on_incomplete_frame() {
        let mut buf = BusBuffer::new();
        buf.feed(&[0x06, 0x03, 0x00, 0x20], Instant::now());
        assert_eq!(buf.extract_frame(always()), FrameResult::Incomplete);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn crc_invalid_frame_is_skipped_not_consumed_as_valid() {
        let mut buf = BusBuffer::new();
        let mut frame = frame::encode_request(0x06, &frame::Request::ReadHolding { addr: 0x20, count: 4 });
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        buf.feed(&frame, Instant::now());
        assert_eq!(buf.extract_frame(always()), FrameResult::CrcFailure);
    }

    #[test]
    fn oversized_buffer_is_trimmed_to_tail() {
        let mut buf = BusBuffer::new();
        buf.feed(&vec![0xAA; MAX_BUFFER_LEN + 10], Instant::now());
        assert_eq!(buf.len(), TRIM_KEEP_LEN);
    }

    #[test]
    fn stale_buffer_is_cleared() {
        let mut buf = BusBuffer::new();
        let t0 = Instant::now();
        buf.feed(&[0x06, 0x03], t0);
        buf.expire_if_stale(t0 + STALE_TIMEOUT);
        assert!(buf.is_empty());
    }

    #[test]
    fn fresh_buffer_survives_expiry_check() {
        let mut buf = BusBuffer::new();
        let t0 = Instant::now();
        buf.feed(&[0x06, 0x03], t0);
        buf.expire_if_stale(t0 + Duration::from_millis(10));
        assert!(!buf.is_empty());
    }

    #[test]
    fn empty_buffer_is_always_idle() {
        let buf = BusBuffer::new();
        assert!(buf.is_idle(Instant::now(), Duration::from_millis(50)));
    }

    #[test]
    fn buffer_is_not_idle_right_after_a_byte_arrives() {
        let mut buf = BusBuffer::new();
        let t0 = Instant::now();
        buf.feed(&[0x06], t0);
        assert!(!buf.is_idle(t0, Duration::from_millis(50)));
        assert!(buf.is_idle(t0 + Duration::from_millis(60), Duration::from_millis(50)));
    }
}
