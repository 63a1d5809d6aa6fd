//! Raw bus monitor: a read-only mode that annotates traffic instead of
//! answering it. Modeled as a pure decoder over already-framed bytes rather
//! than a parallel thread of its own, so it can share the same buffer
//! scanning the arbitrator already does instead of opening a second handle
//! onto the same port.

use modbus_proto::decode::{self, DecodedValue};
use modbus_proto::frame::{self, Request, Response};

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredFrame {
    pub raw: Vec<u8>,
    pub slave_id: u8,
    pub function_code: u8,
    pub summary: String,
    pub decoded: Vec<DecodedValue>,
}

/// Best-effort annotation of one already CRC-verified request frame for
/// the monitor's log, never raising an error: a frame the decoder doesn't
/// understand is still shown, just without field-level detail.
pub fn annotate_request(raw: &[u8]) -> MonitoredFrame {
    let slave_id = raw.first().copied().unwrap_or(0);
    let function_code = raw.get(1).copied().unwrap_or(0);

    match frame::decode_request(raw) {
        Ok(decoded) => {
            let (summary, values) = summarize_request(&decoded.request);
            MonitoredFrame {
                raw: raw.to_vec(),
                slave_id,
                function_code,
                summary,
                decoded: values,
            }
        }
        Err(e) => MonitoredFrame {
            raw: raw.to_vec(),
            slave_id,
            function_code,
            summary: format!("undecodable: {e}"),
            decoded: Vec::new(),
        },
    }
}

fn summarize_request(request: &Request) -> (String, Vec<DecodedValue>) {
    match request {
        Request::ReadHolding { addr, count } => {
            (format!("READ HOLDING 0x{addr:04X} x{count}"), Vec::new())
        }
        Request::ReadInput { addr, count } => {
            (format!("READ INPUT 0x{addr:04X} x{count}"), Vec::new())
        }
        Request::WriteSingle { addr, value } => {
            let decoded = decode::decode_value(*addr, *value, true);
            (
                format!("WRITE 0x{addr:04X} = 0x{value:04X} ({})", decoded.name),
                vec![decoded],
            )
        }
        Request::WriteMultiple { addr, values } => {
            let decoded: Vec<DecodedValue> = values
                .iter()
                .enumerate()
                .map(|(i, v)| decode::decode_value(addr.wrapping_add(i as u16), *v, true))
                .collect();
            (
                format!("WRITE MULTIPLE 0x{addr:04X} x{}", values.len()),
                decoded,
            )
        }
    }
}

/// Annotate a response frame seen on the wire (e.g. the CFW-11's reply to a
/// heartbeat or queued write), given the request function code it answers.
pub fn annotate_response(raw: &[u8], request_fc: u8) -> String {
    if raw.len() < 2 {
        return "short response".to_string();
    }
    let fc = raw[1];
    if fc & 0x80 != 0 {
        let code = raw.get(2).copied().unwrap_or(0);
        return format!("EXCEPTION fc=0x{request_fc:02X} code={code}");
    }
    match parse_response_summary(raw, request_fc) {
        Some(s) => s,
        None => "unrecognized response shape".to_string(),
    }
}

fn parse_response_summary(raw: &[u8], request_fc: u8) -> Option<String> {
    match request_fc {
        frame::FC_READ_HOLDING | frame::FC_READ_INPUT => {
            let byte_count = *raw.get(2)? as usize;
            let values: Vec<u16> = raw
                .get(3..3 + byte_count)?
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Some(format!("{:?}", Response::Read { values }))
        }
        frame::FC_WRITE_SINGLE | frame::FC_WRITE_MULTIPLE => Some("write acknowledged".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn annotates_a_command_word_write() {
        let raw = frame::encode_request(0x06, &Request::WriteSingle { addr: 0x0001, value: 0x0001 });
        let monitored = annotate_request(&raw);
        assert!(monitored.summary.contains("WRITE 0x0001"));
        assert_eq!(monitored.decoded.len(), 1);
    }

    #[test]
    fn annotates_a_read_request() {
        let raw = frame::encode_request(0x06, &Request::ReadHolding { addr: 0x0020, count: 4 });
        let monitored = annotate_request(&raw);
        assert!(monitored.summary.contains("READ HOLDING"));
    }

    #[test]
    fn undecodable_frame_still_produces_a_summary() {
        let raw = [0x06, 0x2B, 0x00, 0x00, 0x00, 0x00];
        let monitored = annotate_request(&raw);
        assert!(monitored.summary.starts_with("undecodable"));
    }

    #[test]
    fn annotates_an_exception_response() {
        let resp = frame::encode_response(0x01, 0x03, &frame::exception(0x03, frame::Exception::IllegalDataValue));
        let summary = annotate_response(&resp, 0x03);
        assert!(summary.contains("EXCEPTION"));
    }
}
