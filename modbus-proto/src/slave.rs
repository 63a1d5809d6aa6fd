//! The impersonated A1000 itself: given one already CRC-verified request
//! frame, decides what the Sullair HMI hears back and what (if anything)
//! needs forwarding to the CFW-11.

use crate::decode::{self, DecodedValue};
use crate::frame::{self, Exception, Request, RequestFrame, Response};
use crate::register::RegisterImage;
use crate::translator::{self, TranslatorParams, WegCommand};

/// Identification registers the HMI reads once at startup and never again;
/// kept read-only by [`RegisterImage`] itself, named here for callers that
/// want to special-case them (e.g. the raw monitor).
pub const A1000_ID_REGISTERS: (u16, u16, u16) = (0x00F0, 0x00F1, 0x00F2);

/// How a register write is handled once it reaches the impersonated drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Writes update the local image and are translated into CFW-11 writes.
    /// The normal operating mode.
    Redirect,
    /// Writes update the local image only; nothing is forwarded to the
    /// CFW-11. Used to observe the HMI without driving the compressor.
    Listen,
    /// Diagnostic-only: inbound writes are decoded and recorded as events
    /// but otherwise ignored — they never touch the register image and
    /// never reach the CFW-11 queue. Only `submit_direct_write` can still
    /// change anything while this mode is active. Reads are also recorded
    /// as decoded events, unlike in `Redirect`/`Listen`.
    Command,
}

/// What handling one frame produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SlaveOutcome {
    /// The bytes to write back to the HMI port, CRC included. `None` means
    /// the frame wasn't addressed to us and must be left alone.
    pub response: Option<Vec<u8>>,
    /// CFW-11 writes this frame produced, for the caller to enqueue.
    pub enqueue: Vec<WegCommand>,
    /// Decoded values worth recording as events.
    pub decoded: Vec<DecodedValue>,
}

/// The impersonated A1000: a register image plus the policy for turning
/// requests against it into responses and CFW-11 commands.
pub struct SlaveEngine {
    pub registers: RegisterImage,
    pub translator: TranslatorParams,
    pub slave_id: u8,
    /// Answer requests for any slave id 1..=247, not just `slave_id`. Used
    /// when the HMI's configured drive address is unknown or changes.
    pub respond_to_any_id: bool,
    pub mode: Mode,
}

impl SlaveEngine {
    pub fn new(registers: RegisterImage, translator: TranslatorParams, slave_id: u8) -> Self {
        Self {
            registers,
            translator,
            slave_id,
            respond_to_any_id: false,
            mode: Mode::Redirect,
        }
    }

    fn addressed_to_us(&self, id: u8) -> bool {
        self.respond_to_any_id && (1..=247).contains(&id) || id == self.slave_id
    }

    /// Handle one already length-framed, CRC-verified request frame (slave
    /// id through the last data byte, no CRC). Returns `None` if the frame
    /// isn't addressed to this engine at all.
    pub fn handle_frame(&mut self, body: &[u8]) -> Option<SlaveOutcome> {
        let decoded_request = match frame::decode_request(body) {
            Ok(r) => r,
            Err(_) => return None,
        };

        if !self.addressed_to_us(decoded_request.slave_id) {
            return None;
        }

        Some(self.dispatch(decoded_request))
    }

    fn dispatch(&mut self, frame: RequestFrame) -> SlaveOutcome {
        let RequestFrame { slave_id, request } = frame;
        let fc = request.function_code();

        match request {
            Request::ReadHolding { addr, count } | Request::ReadInput { addr, count } => {
                let values = self.registers.get(addr, count);
                let decoded = if self.mode == Mode::Command {
                    (0..count)
                        .map(|i| {
                            decode::decode_value(
                                addr.wrapping_add(i),
                                values[i as usize],
                                false,
                            )
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                let response = frame::encode_response(slave_id, fc, &Response::Read { values });
                SlaveOutcome {
                    response: Some(response),
                    enqueue: Vec::new(),
                    decoded,
                }
            }
            Request::WriteSingle { addr, value } => self.handle_write(slave_id, fc, addr, &[value]),
            Request::WriteMultiple { addr, ref values } => {
                let count = values.len() as u16;
                if self.mode != Mode::Command {
                    self.registers.set_many(addr, values);
                }
                let enqueue = self.enqueue_for_write(addr, values);
                let decoded = vec![decode::decode_value(addr, values[0], true)];
                let response =
                    frame::encode_response(slave_id, fc, &Response::WriteMultiple { addr, count });
                SlaveOutcome {
                    response: Some(response),
                    enqueue,
                    decoded,
                }
            }
        }
    }

    fn handle_write(&mut self, slave_id: u8, fc: u8, addr: u16, values: &[u16]) -> SlaveOutcome {
        if self.mode != Mode::Command {
            self.registers.set(addr, values[0]);
        }
        let enqueue = self.enqueue_for_write(addr, values);
        let decoded = vec![decode::decode_value(addr, values[0], true)];
        let response = frame::encode_response(
            slave_id,
            fc,
            &Response::WriteSingle { addr, value: values[0] },
        );
        SlaveOutcome {
            response: Some(response),
            enqueue,
            decoded,
        }
    }

    /// Translate a write into CFW-11 commands, unless we're passively
    /// observing in [`Mode::Listen`] or ignoring inbound writes entirely in
    /// [`Mode::Command`].
    fn enqueue_for_write(&self, addr: u16, values: &[u16]) -> Vec<WegCommand> {
        if self.mode == Mode::Listen || self.mode == Mode::Command {
            return Vec::new();
        }
        values
            .first()
            .map(|v| translator::translate(addr, *v, &self.translator))
            .unwrap_or_default()
    }

    /// Build the exception response for a request this engine couldn't
    /// decode or doesn't support, e.g. an unknown function code reaching
    /// the arbitrator's CRC-verified-but-undecodable path.
    pub fn exception_for(slave_id: u8, request_fc: u8, exception: Exception) -> Vec<u8> {
        frame::encode_response(slave_id, request_fc, &frame::exception(request_fc, exception))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::register::RtcStamp;

    fn engine() -> SlaveEngine {
        let stamp = RtcStamp {
            year: 2026,
            month: 7,
            day: 27,
            hour: 0,
            minute: 0,
            second: 0,
        };
        SlaveEngine::new(
            RegisterImage::healthy_snapshot(stamp),
            TranslatorParams::default(),
            0x06,
        )
    }

    fn read_request(slave_id: u8, fc: u8, addr: u16, count: u16) -> Vec<u8> {
        vec![
            slave_id,
            fc,
            (addr >> 8) as u8,
            addr as u8,
            (count >> 8) as u8,
            count as u8,
        ]
    }

    #[test]
    fn read_of_status_mirror_returns_snapshot_values() {
        let mut eng = engine();
        let body = read_request(0x06, 0x03, 0x0020, 4);
        let outcome = eng.handle_frame(&body).unwrap();
        assert!(outcome.response.is_some());
        assert!(outcome.enqueue.is_empty());
    }

    #[test]
    fn write_to_command_word_enqueues_weg_control_word() {
        let mut eng = engine();
        let body = [0x06, 0x06, 0x00, 0x01, 0x00, 0x01];
        let outcome = eng.handle_frame(&body).unwrap();
        assert_eq!(outcome.enqueue.len(), 1);
        assert_eq!(outcome.enqueue[0].register, 682);
    }

    #[test]
    fn write_command_word_also_updates_status_registers() {
        let mut eng = engine();
        let body = [0x06, 0x06, 0x00, 0x01, 0x00, 0x01];
        eng.handle_frame(&body).unwrap();
        assert_eq!(
            eng.registers.get(crate::register::REG_STATUS, 1)[0]
                & crate::register::BIT_RUNNING,
            crate::register::BIT_RUNNING
        );
    }

    #[test]
    fn frame_for_other_slave_id_is_ignored() {
        let mut eng = engine();
        let body = read_request(0x09, 0x03, 0x0020, 4);
        assert!(eng.handle_frame(&body).is_none());
    }

    #[test]
    fn respond_to_any_id_answers_any_slave() {
        let mut eng = engine();
        eng.respond_to_any_id = true;
        let body = read_request(0x09, 0x03, 0x0020, 4);
        assert!(eng.handle_frame(&body).is_some());
    }

    #[test]
    fn listen_mode_updates_registers_but_does_not_enqueue() {
        let mut eng = engine();
        eng.mode = Mode::Listen;
        let body = [0x06, 0x06, 0x00, 0x01, 0x00, 0x01];
        let outcome = eng.handle_frame(&body).unwrap();
        assert!(outcome.enqueue.is_empty());
        assert_eq!(
            eng.registers.get(crate::register::REG_STATUS, 1)[0]
                & crate::register::BIT_RUNNING,
            crate::register::BIT_RUNNING
        );
    }

    #[test]
    fn command_mode_ignores_inbound_writes() {
        let mut eng = engine();
        eng.mode = Mode::Command;
        let before = eng.registers.get(crate::register::REG_STATUS, 1)[0];
        let body = [0x06, 0x06, 0x00, 0x01, 0x00, 0x01];
        let outcome = eng.handle_frame(&body).unwrap();
        assert!(outcome.enqueue.is_empty());
        assert!(outcome.response.is_some());
        assert_eq!(eng.registers.get(crate::register::REG_STATUS, 1)[0], before);
    }

    #[test]
    fn command_mode_records_decoded_events_on_reads() {
        let mut eng = engine();
        eng.mode = Mode::Command;
        let body = read_request(0x06, 0x03, 0x0020, 4);
        let outcome = eng.handle_frame(&body).unwrap();
        assert_eq!(outcome.decoded.len(), 4);
    }

    #[test]
    fn identification_registers_are_read_only_through_the_engine() {
        let mut eng = engine();
        let body = [0x06, 0x06, 0x00, 0xF0, 0x12, 0x34];
        eng.handle_frame(&body).unwrap();
        assert_eq!(eng.registers.get(0x00F0, 1), vec![0]);
    }
}
