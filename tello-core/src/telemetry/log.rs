//! Walker for the log-record stream carried by `LogDataMsg`.
//!
//! ```text
//! offset  size        field
//! 0       1           sync (0x55)
//! 1       2           record length (i16, includes everything)
//! 3       1           checksum (not validated)
//! 4       2           record id
//! 6       1           xor key (low byte of the tick)
//! 7       3           rest of the tick
//! 10      length-12   payload, each byte xor key
//! length-2 2          record crc
//! ```
//!
//! The stream as a whole ends with two bytes that belong to no record.

use std::collections::HashSet;

use tracing::debug;

use crate::error::TelloError;
use crate::telemetry::records::{
    ID_IMU_ATTI, ID_IMU_EXT, ID_MVO_FEEDBACK, ImuAttitude, ImuExtended, MvoFeedback,
};
use crate::telemetry::snapshot::TelemetrySnapshot;

pub const LOG_SYNC: u8 = 0x55;

const PAYLOAD_OFFSET: usize = 10;
const RECORD_OVERHEAD: usize = 12;
const STREAM_TRAILER: usize = 2;

/// Decodes log-record streams into a snapshot, remembering which
/// unknown record ids it has already reported.
#[derive(Debug, Default)]
pub struct LogDecoder {
    unknown_ids: HashSet<u16>,
}

impl LogDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every record in `stream` to `snapshot`.
    ///
    /// Records before a sync or length error are kept; the rest of the
    /// stream is dropped and the error names the offending offset.
    /// Returns the number of records walked.
    pub fn apply(
        &mut self,
        stream: &[u8],
        snapshot: &mut TelemetrySnapshot,
    ) -> Result<usize, TelloError> {
        let end = stream
            .len()
            .checked_sub(STREAM_TRAILER)
            .ok_or(TelloError::CorruptedTelemetryStream { offset: 0 })?;

        let mut pos = 0;
        let mut records = 0;
        while pos < end {
            let corrupted = TelloError::CorruptedTelemetryStream { offset: pos };
            if stream[pos] != LOG_SYNC || pos + PAYLOAD_OFFSET > stream.len() {
                return Err(corrupted);
            }

            let length = i16::from_le_bytes([stream[pos + 1], stream[pos + 2]]);
            let length = match usize::try_from(length) {
                Ok(l) if l >= RECORD_OVERHEAD && pos + l <= stream.len() => l,
                _ => return Err(corrupted),
            };
            let id = u16::from_le_bytes([stream[pos + 4], stream[pos + 5]]);
            let key = stream[pos + 6];

            let payload: Vec<u8> = stream[pos + PAYLOAD_OFFSET..pos + length - 2]
                .iter()
                .map(|b| b ^ key)
                .collect();
            self.apply_record(id, &payload, snapshot);

            records += 1;
            pos += length;
        }

        if pos != end {
            return Err(TelloError::CorruptedTelemetryStream { offset: pos });
        }
        Ok(records)
    }

    fn apply_record(&mut self, id: u16, payload: &[u8], snapshot: &mut TelemetrySnapshot) {
        let applied = match id {
            ID_MVO_FEEDBACK => MvoFeedback::decode(payload).map(|m| snapshot.mvo = m),
            ID_IMU_ATTI => ImuAttitude::decode(payload).map(|imu| snapshot.imu = imu),
            ID_IMU_EXT => ImuExtended::decode(payload).map(|ext| snapshot.imu_ext = ext),
            _ => {
                if self.unknown_ids.insert(id) {
                    debug!(id, len = payload.len(), "unhandled log record");
                }
                return;
            }
        };
        if applied.is_none() {
            debug!(id, len = payload.len(), "log record too short");
        }
    }

    /// Record ids seen but not understood.
    pub fn unknown_ids(&self) -> &HashSet<u16> {
        &self.unknown_ids
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode one record the way the flight controller does.
    fn record(id: u16, key: u8, payload: &[u8]) -> Vec<u8> {
        let length = (payload.len() + RECORD_OVERHEAD) as i16;
        let mut out = vec![LOG_SYNC];
        out.extend_from_slice(&length.to_le_bytes());
        out.push(0xee);
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&[key, 0, 0, 0]);
        out.extend(payload.iter().map(|b| b ^ key));
        out.extend_from_slice(&[0, 0]);
        out
    }

    fn stream(records: &[Vec<u8>]) -> Vec<u8> {
        let mut s: Vec<u8> = records.concat();
        s.extend_from_slice(&[0xab, 0xcd]);
        s
    }

    fn mvo_payload(vel_x_mm: i16) -> Vec<u8> {
        let mut p = vec![0u8; MvoFeedback::MIN_LEN];
        p[2..4].copy_from_slice(&vel_x_mm.to_le_bytes());
        p[76] = 0x07;
        p
    }

    #[test]
    fn decodes_xored_mvo_record() {
        let mut snap = TelemetrySnapshot::default();
        let mut dec = LogDecoder::new();
        let s = stream(&[record(ID_MVO_FEEDBACK, 0x5a, &mvo_payload(2000))]);

        assert_eq!(dec.apply(&s, &mut snap).unwrap(), 1);
        assert_eq!(snap.mvo.velocity[0], 2.0);
        assert_eq!(snap.mvo.validity.velocity(), [true, true, true]);
    }

    #[test]
    fn unknown_ids_are_remembered_once() {
        let mut snap = TelemetrySnapshot::default();
        let mut dec = LogDecoder::new();
        let s = stream(&[record(0x0123, 1, &[1, 2, 3]), record(0x0123, 2, &[4])]);

        assert_eq!(dec.apply(&s, &mut snap).unwrap(), 2);
        assert_eq!(dec.unknown_ids().len(), 1);
        assert_eq!(snap, TelemetrySnapshot::default());
    }

    #[test]
    fn missing_sync_keeps_earlier_records() {
        let mut snap = TelemetrySnapshot::default();
        let mut dec = LogDecoder::new();
        let good = record(ID_MVO_FEEDBACK, 0, &mvo_payload(1000));
        let mut bad = record(ID_MVO_FEEDBACK, 0, &mvo_payload(3000));
        bad[0] = 0x54;
        let offset = good.len();

        let err = dec.apply(&stream(&[good, bad]), &mut snap).unwrap_err();
        assert!(matches!(err, TelloError::CorruptedTelemetryStream { offset: o } if o == offset));
        assert_eq!(snap.mvo.velocity[0], 1.0);
    }

    #[test]
    fn misaligned_end_is_corruption() {
        let mut snap = TelemetrySnapshot::default();
        let mut dec = LogDecoder::new();
        let mut s = stream(&[record(0x0200, 0, &[9; 4])]);
        s.push(0);

        assert!(matches!(
            dec.apply(&s, &mut snap),
            Err(TelloError::CorruptedTelemetryStream { .. })
        ));
    }

    #[test]
    fn zero_length_record_does_not_spin() {
        let mut snap = TelemetrySnapshot::default();
        let mut dec = LogDecoder::new();
        let s = [LOG_SYNC, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(dec.apply(&s, &mut snap).is_err());
    }

    #[test]
    fn empty_and_trailer_only_streams() {
        let mut snap = TelemetrySnapshot::default();
        let mut dec = LogDecoder::new();
        assert!(dec.apply(&[], &mut snap).is_err());
        assert_eq!(dec.apply(&[0, 0], &mut snap).unwrap(), 0);
    }
}
