//! Control frames and the literal handshake exchange.
//!
//! A [`Frame`] is built with a message id, a type tag and a payload, and
//! only becomes wire bytes through [`Frame::finalize`], which fills in
//! the length, both CRCs and the sequence number. Inbound datagrams go
//! through [`Frame::parse`], which also recognises the `conn_ack:` reply
//! that does not use the framed format at all.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::Timelike;

use crate::crc::crc16;
use crate::error::TelloError;
use crate::header::{FrameHeader, HEADER_SIZE, MIN_FRAME_SIZE, TRAILER_SIZE};
use crate::message::{MessageId, PacketType};

/// Literal prefix of the handshake request.
pub const CONN_REQUEST: &[u8] = b"conn_req:";

/// Literal prefix of the handshake acknowledgement.
pub const CONN_ACK: &[u8] = b"conn_ack:";

// ── Frame ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    packet_type: u8,
    message_id: u16,
    sequence: u16,
    payload: BytesMut,
}

impl Frame {
    /// A frame with an empty payload.
    pub fn new(message_id: impl Into<u16>, packet_type: PacketType) -> Self {
        Self {
            packet_type: packet_type as u8,
            message_id: message_id.into(),
            sequence: 0,
            payload: BytesMut::new(),
        }
    }

    /// A frame carrying `payload` verbatim.
    pub fn build(message_id: impl Into<u16>, packet_type: PacketType, payload: &[u8]) -> Self {
        let mut frame = Self::new(message_id, packet_type);
        frame.payload.extend_from_slice(payload);
        frame
    }

    pub fn with_u8(mut self, value: u8) -> Self {
        self.payload.put_u8(value);
        self
    }

    pub fn with_u16(mut self, value: u16) -> Self {
        self.payload.put_u16_le(value);
        self
    }

    pub fn with_i16(mut self, value: i16) -> Self {
        self.payload.put_i16_le(value);
        self
    }

    pub fn with_u32(mut self, value: u32) -> Self {
        self.payload.put_u32_le(value);
        self
    }

    pub fn with_bytes(mut self, value: &[u8]) -> Self {
        self.payload.extend_from_slice(value);
        self
    }

    /// Append the ten-byte wall-clock stamp used by time sync and sticks:
    /// hour, minute, second, then the millisecond count split into a low
    /// and a high byte, each widened to an i16.
    pub fn with_time(self, time: &impl Timelike) -> Self {
        let millis = (time.nanosecond() / 1_000_000) % 1000;
        self.with_i16(time.hour() as i16)
            .with_i16(time.minute() as i16)
            .with_i16(time.second() as i16)
            .with_i16((millis & 0xff) as i16)
            .with_i16(((millis >> 8) & 0xff) as i16)
    }

    /// Produce the wire bytes: header, payload and trailing crc16.
    pub fn finalize(&self, sequence: u16) -> Bytes {
        let total = HEADER_SIZE + self.payload.len() + TRAILER_SIZE;
        debug_assert!(total <= crate::header::MAX_FRAME_SIZE);

        let mut buf = BytesMut::with_capacity(total);
        FrameHeader {
            length: total as u16,
            packet_type: self.packet_type,
            message_id: self.message_id,
            sequence,
        }
        .encode(&mut buf);
        buf.extend_from_slice(&self.payload);
        let crc = crc16(&buf);
        buf.put_u16_le(crc);
        buf.freeze()
    }

    /// Decode one inbound datagram.
    pub fn parse(data: &[u8]) -> Result<Inbound, TelloError> {
        if let Some(rest) = data.strip_prefix(CONN_ACK) {
            return match rest {
                [lo, hi, ..] => Ok(Inbound::HandshakeAck { port: [*lo, *hi] }),
                _ => Err(TelloError::MalformedFrame("truncated conn_ack")),
            };
        }

        let header = FrameHeader::decode(data)?;
        if data.len() < MIN_FRAME_SIZE {
            return Err(TelloError::MalformedFrame("shorter than minimum frame"));
        }
        if header.length as usize != data.len() {
            return Err(TelloError::MalformedFrame("length field disagrees with datagram"));
        }

        let body_end = data.len() - TRAILER_SIZE;
        let trailer = u16::from_le_bytes([data[body_end], data[body_end + 1]]);
        if crc16(&data[..body_end]) != trailer {
            return Err(TelloError::MalformedFrame("frame crc mismatch"));
        }

        Ok(Inbound::Frame(Self {
            packet_type: header.packet_type,
            message_id: header.message_id,
            sequence: header.sequence,
            payload: BytesMut::from(&data[HEADER_SIZE..body_end]),
        }))
    }

    /// The raw 16-bit id; unknown ids are kept as-is.
    pub fn raw_id(&self) -> u16 {
        self.message_id
    }

    pub fn message_id(&self) -> Result<MessageId, TelloError> {
        MessageId::try_from(self.message_id)
    }

    pub fn packet_type(&self) -> u8 {
        self.packet_type
    }

    /// Sequence number of a parsed frame (0 for frames not yet sent).
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size on the wire once finalized.
    pub fn wire_len(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }
}

// ── Inbound ──────────────────────────────────────────────────────

/// Result of parsing a control-port datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The device accepted our `conn_req:`; `port` echoes the two
    /// bytes we sent.
    HandshakeAck { port: [u8; 2] },
    Frame(Frame),
}

// ── Handshake ────────────────────────────────────────────────────

/// Build the `conn_req:` datagram with `port` as two BCD bytes,
/// thousands/hundreds first and tens/ones second.
pub fn handshake_request(port: u16) -> Bytes {
    let digit = |div: u16| ((port / div) % 10) as u8;
    let mut buf = BytesMut::with_capacity(CONN_REQUEST.len() + 2);
    buf.extend_from_slice(CONN_REQUEST);
    buf.put_u8(digit(1000) << 4 | digit(100));
    buf.put_u8(digit(10) << 4 | digit(1));
    buf.freeze()
}

// ── Tests ────────────────────────────────────────────────────────
