//! The 9-byte header that opens every control frame.
//!
//! ```text
//! offset  size  field
//! 0       1     start marker (0xCC)
//! 1       2     total length << 3, little-endian
//! 3       1     crc8 over bytes 0..3
//! 4       1     packet type tag
//! 5       2     message id, little-endian
//! 7       2     sequence number, little-endian
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::crc::crc8;
use crate::error::TelloError;

/// First byte of every framed datagram.
pub const START_OF_PACKET: u8 = 0xcc;

/// Encoded header size.
pub const HEADER_SIZE: usize = 9;

/// Trailing crc16.
pub const TRAILER_SIZE: usize = 2;

/// A frame with an empty payload.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest length the shifted 16-bit field can carry.
pub const MAX_FRAME_SIZE: usize = (u16::MAX >> 3) as usize;

// ── FrameHeader ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame length including header and trailer.
    pub length: u16,
    pub packet_type: u8,
    pub message_id: u16,
    pub sequence: u16,
}

impl FrameHeader {
    /// Append the encoded header to `buf`, computing the header crc.
    pub fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(START_OF_PACKET);
        buf.put_u16_le(self.length << 3);
        let crc = crc8(&buf[start..start + 3]);
        buf.put_u8(crc);
        buf.put_u8(self.packet_type);
        buf.put_u16_le(self.message_id);
        buf.put_u16_le(self.sequence);
    }

    /// Decode and validate the header at the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, TelloError> {
        if data.first() != Some(&START_OF_PACKET) {
            return Err(TelloError::MalformedFrame("bad start marker"));
        }
        if data.len() < HEADER_SIZE {
            return Err(TelloError::MalformedFrame("shorter than header"));
        }
        if crc8(&data[0..3]) != data[3] {
            return Err(TelloError::MalformedFrame("header crc mismatch"));
        }

        let mut cur = &data[1..HEADER_SIZE];
        let length = cur.get_u16_le() >> 3;
        cur.advance(1);
        Ok(Self {
            length,
            packet_type: cur.get_u8(),
            message_id: cur.get_u16_le(),
            sequence: cur.get_u16_le(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_wire_layout() {
        let hdr = FrameHeader {
            length: 11,
            packet_type: 0x68,
            message_id: 0x54,
            sequence: 0x01e4,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(&buf[..], &[0xcc, 0x58, 0x00, 0x7c, 0x68, 0x54, 0x00, 0xe4, 0x01]);
    }

    #[test]
    fn decode_recovers_fields() {
        let hdr = FrameHeader {
            length: 40,
            packet_type: 0x50,
            message_id: 0x1051,
            sequence: 7,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(FrameHeader::decode(&buf).unwrap(), hdr);
    }

    #[test]
    fn decode_rejects_marker() {
        let err = FrameHeader::decode(&[0xcd, 0x58, 0x00, 0x7c, 0x68, 0x54, 0x00, 0, 0]);
        assert!(matches!(err, Err(TelloError::MalformedFrame(_))));
        assert!(FrameHeader::decode(&[]).is_err());
    }

    #[test]
    fn decode_rejects_header_crc() {
        let err = FrameHeader::decode(&[0xcc, 0x58, 0x00, 0x7d, 0x68, 0x54, 0x00, 0, 0]);
        assert!(matches!(
            err,
            Err(TelloError::MalformedFrame("header crc mismatch"))
        ));
    }

    #[test]
    fn decode_rejects_truncated() {
        assert!(FrameHeader::decode(&[0xcc, 0x58, 0x00, 0x7c]).is_err());
    }
}
