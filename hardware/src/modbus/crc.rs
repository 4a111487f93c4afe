//! CRC-16/MODBUS for RTU frames
//!
//! Reflected polynomial 0xA001, initial value 0xFFFF. The CRC is appended to
//! the frame low byte first.

const POLYNOMIAL: u16 = 0xA001;

/// Compute the Modbus CRC over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFFu16, |mut crc, &byte| {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
        crc
    })
}

/// Append the CRC of `frame` to it.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Split a received frame into payload and verify its trailing CRC.
///
/// Returns `(computed, stored)` on mismatch.
pub fn verify_crc(frame: &[u8]) -> Result<&[u8], (u16, u16)> {
    if frame.len() < 3 {
        return Err((0, 0));
    }
    let data_end = frame.len() - 2;
    let computed = crc16(&frame[..data_end]);
    let stored = u16::from_le_bytes([frame[data_end], frame[data_end + 1]]);

    if computed == stored {
        Ok(&frame[..data_end])
    } else {
        Err((computed, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_holding_registers_reference_frame() {
        // Read 10 holding registers from slave 1 starting at 0: 01 03 00 00 00 0A C5 CD
        let mut frame = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        assert_eq!(crc16(&frame), 0xCDC5);

        append_crc(&mut frame);
        assert_eq!(&frame[6..], &[0xC5, 0xCD]);
        assert!(verify_crc(&frame).is_ok());
    }

    #[test]
    fn test_empty_input_is_initial_value() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_corrupted_frame_fails() {
        let mut frame = vec![0x11, 0x06, 0x00, 0x01, 0x00, 0x03];
        append_crc(&mut frame);
        frame[3] ^= 0x40;
        assert!(verify_crc(&frame).is_err());
    }

    #[test]
    fn test_short_frame_fails() {
        assert!(verify_crc(&[0x01, 0x02]).is_err());
    }
}
