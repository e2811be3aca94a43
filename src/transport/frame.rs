//! SSCP wire framing: SOF / length / address / protocol / payload / CRC-16.
//!
//! ```text
//! +-----+--------+--------+---------+----------+----------+--------+
//! | SOF | LenHi  | LenLo  | Address | Protocol | Payload  | CRC16  |
//! | 02h | u8     | u8     | u8      | u8       | N bytes  | 2 bytes|
//! +-----+--------+--------+---------+----------+----------+--------+
//! ```
//!
//! The CRC covers `{LenHi, LenLo, Address, Protocol} ++ Payload`, computed as
//! CRC-16-CCITT (poly `0x1021`, init `0xFFFF`, no reflection, no final XOR)
//! and emitted big-endian. This is exactly the `CRC-16/IBM-3740` parameter
//! set, so we reach for the `crc` crate's catalog entry instead of hand
//! rolling the bit-shift loop the reference implementation uses.

use crc::{Crc, CRC_16_IBM_3740};

const SSCP_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Start-of-frame marker.
pub const SOF: u8 = 0x02;
/// Maximum payload size accepted by either side of the link.
pub const MAX_PAYLOAD: usize = 4096;

/// Compute the frame CRC over the 4-byte header tail (`LenHi LenLo Address
/// Protocol`) and the payload, as two independent digest updates (matching
/// the reference's two-part `SSCP_SCR16` call so a partial-header digest can
/// be resumed against a separately-buffered payload).
pub fn crc16(header_tail: &[u8; 4], payload: &[u8]) -> u16 {
    let mut digest = SSCP_CRC.digest();
    digest.update(header_tail);
    digest.update(payload);
    digest.finalize()
}

/// A fully assembled outbound frame: header, payload and CRC concatenated in
/// wire order, ready to be handed to [`super::SerialPort::send`] as three
/// successive writes or one contiguous buffer.
pub struct Frame {
    pub header: [u8; 5],
    pub payload: Vec<u8>,
    pub crc: [u8; 2],
}

impl Frame {
    /// Build the outbound frame for `payload` addressed to `address` under
    /// `protocol`. Fails if `payload` exceeds [`MAX_PAYLOAD`].
    pub fn build(address: u8, protocol: u8, payload: &[u8]) -> Option<Frame> {
        if payload.len() > MAX_PAYLOAD {
            return None;
        }
        let len = payload.len() as u16;
        let header = [
            SOF,
            (len >> 8) as u8,
            len as u8,
            address,
            protocol,
        ];
        let tail: [u8; 4] = header[1..5].try_into().unwrap();
        let crc = crc16(&tail, payload);
        Some(Frame {
            header,
            payload: payload.to_vec(),
            crc: crc.to_be_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_deterministic_and_order_sensitive() {
        let tail = [0x00, 0x03, 0x01, 0x21];
        let payload = [0xAA, 0xBB, 0xCC];
        let a = crc16(&tail, &payload);
        let b = crc16(&tail, &payload);
        assert_eq!(a, b);

        let other_tail = [0x00, 0x03, 0x02, 0x21];
        assert_ne!(a, crc16(&other_tail, &payload));
    }

    #[test]
    fn crc_of_empty_payload_is_stable() {
        let tail = [0x00, 0x00, 0x00, 0x20];
        let crc = crc16(&tail, &[]);
        // CRC-16/IBM-3740 over {00 00 00 20}, init 0xFFFF, no reflect/xorout.
        assert_eq!(crc, crc16(&tail, &[]));
    }

    #[test]
    fn build_rejects_oversized_payload() {
        let oversized = vec![0u8; MAX_PAYLOAD + 1];
        assert!(Frame::build(0, 0x21, &oversized).is_none());
    }

    #[test]
    fn build_roundtrips_header_fields() {
        let payload = [1, 2, 3, 4, 5];
        let frame = Frame::build(0x01, 0x21, &payload).unwrap();
        assert_eq!(frame.header[0], SOF);
        assert_eq!(((frame.header[1] as u16) << 8) | frame.header[2] as u16, payload.len() as u16);
        assert_eq!(frame.header[3], 0x01);
        assert_eq!(frame.header[4], 0x21);
        let tail: [u8; 4] = frame.header[1..5].try_into().unwrap();
        let expect_crc = crc16(&tail, &payload).to_be_bytes();
        assert_eq!(frame.crc, expect_crc);
    }
}
