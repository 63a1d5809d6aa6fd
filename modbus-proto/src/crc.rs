//! Modbus CRC-16: polynomial 0xA001 reflected (equivalently 0x8005
//! unreflected), initial value 0xFFFF, no final XOR, emitted little-endian
//! at the frame tail. This is the `CRC-16/MODBUS` catalog entry.

const MODBUS: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Compute the CRC-16 of `data`.
pub fn compute(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// Check that the trailing two bytes of `frame` are its CRC-16, little-endian.
///
/// Returns `false` for frames shorter than 2 bytes.
pub fn verify(frame: &[u8]) -> bool {
    let Some(split) = frame.len().checked_sub(2) else {
        return false;
    };
    let (body, tail) = frame.split_at(split);
    let received = u16::from_le_bytes([tail[0], tail[1]]);
    received == compute(body)
}

/// Append the little-endian CRC-16 of `body` to `out`.
pub fn append(out: &mut Vec<u8>) {
    let crc = compute(out);
    out.extend_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_vector() {
        // 01 03 00 00 00 0A -> CRC C5CD (a commonly cited Modbus worked example)
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        assert_eq!(compute(&frame), 0xCDC5);
    }

    #[test]
    fn verify_roundtrip() {
        let mut frame = vec![0x06, 0x03, 0x00, 0x20, 0x00, 0x04];
        append(&mut frame);
        assert!(verify(&frame));
    }

    #[test]
    fn verify_rejects_corruption() {
        let mut frame = vec![0x06, 0x03, 0x00, 0x20, 0x00, 0x04];
        append(&mut frame);
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        assert!(!verify(&frame));
    }

    #[quickcheck_macros::quickcheck]
    fn every_frame_we_append_to_verifies(body: Vec<u8>) -> bool {
        let mut frame = body;
        append(&mut frame);
        verify(&frame)
    }
}
