//! Encode/decode for the four Modbus function codes this gateway speaks:
//! 0x03 (read holding registers), 0x04 (read input registers), 0x06 (write
//! single register), 0x10 (write multiple registers). All other function
//! codes decode as [`FrameError::UnknownFunction`] and are answered with an
//! illegal-function exception by the caller.

use crate::error::FrameError;

pub const FC_READ_HOLDING: u8 = 0x03;
pub const FC_READ_INPUT: u8 = 0x04;
pub const FC_WRITE_SINGLE: u8 = 0x06;
pub const FC_WRITE_MULTIPLE: u8 = 0x10;

pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// The maximum register count a single 0x03/0x04/0x10 request may name.
pub const MAX_REGISTER_COUNT: u16 = 125;

/// A decoded request PDU, without the leading slave id (kept alongside it
/// in [`RequestFrame`]) or the trailing CRC (checked separately, since a bad
/// CRC must never even reach this decoder's caller).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    ReadHolding { addr: u16, count: u16 },
    ReadInput { addr: u16, count: u16 },
    WriteSingle { addr: u16, value: u16 },
    WriteMultiple { addr: u16, values: Vec<u16> },
}

impl Request {
    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadHolding { .. } => FC_READ_HOLDING,
            Request::ReadInput { .. } => FC_READ_INPUT,
            Request::WriteSingle { .. } => FC_WRITE_SINGLE,
            Request::WriteMultiple { .. } => FC_WRITE_MULTIPLE,
        }
    }
}

/// A decoded request frame: slave address plus the request it carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFrame {
    pub slave_id: u8,
    pub request: Request,
}

/// A response PDU, without the leading slave id or trailing CRC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Read { values: Vec<u16> },
    WriteSingle { addr: u16, value: u16 },
    WriteMultiple { addr: u16, count: u16 },
    Exception { function_code: u8, code: u8 },
}

/// Exception codes this gateway produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Exception {
    IllegalFunction = EXCEPTION_ILLEGAL_FUNCTION,
    IllegalDataValue = EXCEPTION_ILLEGAL_DATA_VALUE,
}

/// Expected length (including CRC) of the request-shaped frame starting at
/// `buf[0]`, or `None` if more bytes are needed to know. Used by the bus
/// arbitrator to scan a buffer that may hold several concatenated frames.
pub fn request_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    match buf[1] {
        FC_READ_HOLDING | FC_READ_INPUT | FC_WRITE_SINGLE => Some(8),
        FC_WRITE_MULTIPLE => {
            if buf.len() < 7 {
                return None;
            }
            let byte_count = buf[6] as usize;
            Some(9 + byte_count)
        }
        _ => None,
    }
}

/// Expected length (including CRC) of the response-shaped frame starting at
/// `buf[0]`, as sent by a slave such as the CFW-11. Used when reading back
/// the reply to a queued write or heartbeat read.
pub fn response_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    let fc = buf[1];
    if fc & 0x80 != 0 {
        return Some(5); // slave, fc|0x80, code, crc, crc
    }
    match fc {
        FC_READ_HOLDING | FC_READ_INPUT => {
            if buf.len() < 3 {
                return None;
            }
            let byte_count = buf[2] as usize;
            Some(3 + byte_count + 2)
        }
        FC_WRITE_SINGLE | FC_WRITE_MULTIPLE => Some(8),
        _ => None,
    }
}

/// Decode a request frame (slave id through the last data byte, no CRC).
/// `frame` must already have had its trailing CRC stripped and verified by
/// the caller, and be exactly `request_frame_len(frame)` bytes long.
pub fn decode_request(frame: &[u8]) -> Result<RequestFrame, FrameError> {
    if frame.len() < 6 {
        return Err(FrameError::Incomplete);
    }
    let slave_id = frame[0];
    let fc = frame[1];
    let addr = u16::from_be_bytes([frame[2], frame[3]]);

    let request = match fc {
        FC_READ_HOLDING | FC_READ_INPUT => {
            let count = u16::from_be_bytes([frame[4], frame[5]]);
            if count < 1 || count > MAX_REGISTER_COUNT {
                return Err(FrameError::IllegalDataValue);
            }
            if fc == FC_READ_HOLDING {
                Request::ReadHolding { addr, count }
            } else {
                Request::ReadInput { addr, count }
            }
        }
        FC_WRITE_SINGLE => {
            let value = u16::from_be_bytes([frame[4], frame[5]]);
            Request::WriteSingle { addr, value }
        }
        FC_WRITE_MULTIPLE => {
            let count = u16::from_be_bytes([frame[4], frame[5]]) as usize;
            if frame.len() < 7 {
                return Err(FrameError::Incomplete);
            }
            let byte_count = frame[6] as usize;
            if byte_count != count * 2 || frame.len() < 7 + byte_count {
                return Err(FrameError::IllegalDataValue);
            }
            if count < 1 || count as u16 > MAX_REGISTER_COUNT {
                return Err(FrameError::IllegalDataValue);
            }
            let values = frame[7..7 + byte_count]
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Request::WriteMultiple { addr, values }
        }
        other => return Err(FrameError::UnknownFunction(other)),
    };

    Ok(RequestFrame { slave_id, request })
}

/// Encode a request PDU (used by the arbitrator to build CFW-11 writes and
/// heartbeat reads), with slave id and trailing CRC.
pub fn encode_request(slave_id: u8, request: &Request) -> Vec<u8> {
    let mut out = vec![slave_id, request.function_code()];
    match request {
        Request::ReadHolding { addr, count } | Request::ReadInput { addr, count } => {
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        Request::WriteSingle { addr, value } => {
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        }
        Request::WriteMultiple { addr, values } => {
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&(values.len() as u16).to_be_bytes());
            out.push((values.len() * 2) as u8);
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    crate::crc::append(&mut out);
    out
}

/// Encode a response PDU, with slave id and trailing CRC. `request_fc` is
/// the function code the request carried, used for both the normal
/// response (echoed back) and the exception's `fc | 0x80` byte.
pub fn encode_response(slave_id: u8, request_fc: u8, response: &Response) -> Vec<u8> {
    let mut out = vec![slave_id];
    match response {
        Response::Read { values } => {
            out.push(request_fc);
            out.push((values.len() * 2) as u8);
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        Response::WriteSingle { addr, value } => {
            out.push(FC_WRITE_SINGLE);
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        }
        Response::WriteMultiple { addr, count } => {
            out.push(FC_WRITE_MULTIPLE);
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        Response::Exception { function_code, code } => {
            out.push(function_code | 0x80);
            out.push(*code);
        }
    }
    crate::crc::append(&mut out);
    out
}

/// Build an exception [`Response`] for the given request function code.
pub fn exception(request_fc: u8, exception: Exception) -> Response {
    Response::Exception {
        function_code: request_fc,
        code: exception as u8,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_holding_request_len() {
        let buf = [0x06, 0x03, 0x00, 0x20, 0x00, 0x04, 0xAA, 0xBB];
        assert_eq!(request_frame_len(&buf), Some(8));
    }

    #[test]
    fn write_multiple_request_len_depends_on_byte_count() {
        // slave, fc, addr_hi, addr_lo, cnt_hi, cnt_lo, byte_count=4, data(4B), crc(2B)
        let buf = [0x06, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0, 1, 0, 2, 0, 0];
        assert_eq!(request_frame_len(&buf), Some(13));
    }

    #[test]
    fn decode_read_holding() {
        let body = [0x06, 0x03, 0x00, 0x20, 0x00, 0x04];
        let frame = decode_request(&body).unwrap();
        assert_eq!(frame.slave_id, 0x06);
        assert_eq!(
            frame.request,
            Request::ReadHolding {
                addr: 0x0020,
                count: 4
            }
        );
    }

    #[test]
    fn decode_write_single() {
        let body = [0x06, 0x06, 0x00, 0x01, 0x00, 0x01];
        let frame = decode_request(&body).unwrap();
        assert_eq!(
            frame.request,
            Request::WriteSingle {
                addr: 0x0001,
                value: 0x0001
            }
        );
    }

    #[test]
    fn decode_rejects_zero_count() {
        let body = [0x06, 0x03, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(decode_request(&body), Err(FrameError::IllegalDataValue));
    }

    #[test]
    fn decode_rejects_overlong_count() {
        let body = [0x06, 0x03, 0x00, 0x20, 0x00, 126];
        assert_eq!(decode_request(&body), Err(FrameError::IllegalDataValue));
    }

    #[test]
    fn decode_unknown_function() {
        let body = [0x06, 0x05, 0x00, 0x20, 0xff, 0x00];
        assert_eq!(decode_request(&body), Err(FrameError::UnknownFunction(5)));
    }

    #[test]
    fn round_trip_write_single_echo() {
        let resp = encode_response(
            0x06,
            FC_WRITE_SINGLE,
            &Response::WriteSingle {
                addr: 0x0001,
                value: 0x0001,
            },
        );
        assert!(crate::crc::verify(&resp));
        assert_eq!(resp[..6], [0x06, 0x06, 0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn exception_response_shape() {
        let resp = encode_response(0x06, 0x05, &exception(0x05, Exception::IllegalFunction));
        assert_eq!(resp[..3], [0x06, 0x85, 0x01]);
        assert!(crate::crc::verify(&resp));
    }
}
