//! Slice reassembly for the video port.
//!
//! ```text
//! byte 0      slice id (wraps at 256)
//! byte 1      bit 7: last fragment of slice, bits 0-6: fragment number
//! byte 2..    H.264 bytes
//! ```
//!
//! Fragments must arrive in order. Anything else throws away the slice
//! in progress, and nothing more is accepted until the next fragment 0.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::TelloError;

// ── SliceHeader ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceHeader {
    pub slice: u8,
    pub fragment: u8,
    pub last: bool,
}

impl SliceHeader {
    pub const SIZE: usize = 2;

    pub fn decode(data: &[u8]) -> Result<Self, TelloError> {
        match data {
            [slice, bits, ..] => Ok(Self {
                slice: *slice,
                fragment: bits & 0x7f,
                last: bits & 0x80 != 0,
            }),
            _ => Err(TelloError::MalformedFrame("video datagram shorter than slice header")),
        }
    }
}

// ── SliceAssembler ───────────────────────────────────────────────

/// Outcome of feeding one datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum SlicePush {
    /// Accepted, slice not finished yet.
    Pending,
    /// Accepted and it closed the slice.
    Complete(Bytes),
    /// Rejected; any partial slice was thrown away.
    Discarded,
}

#[derive(Debug, Default)]
pub struct SliceAssembler {
    /// Slice being accumulated and the fragment number expected next.
    current: Option<(u8, u8)>,
    buffer: BytesMut,
    slices: u64,
    discards: u64,
}

impl SliceAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, datagram: &[u8]) -> Result<SlicePush, TelloError> {
        let header = SliceHeader::decode(datagram)?;

        let continues = matches!(
            self.current,
            Some((slice, next)) if slice == header.slice && next == header.fragment
        );
        if header.fragment == 0 {
            if !self.buffer.is_empty() {
                debug!(
                    dropped = self.buffer.len(),
                    slice = header.slice,
                    "slice restarted before its last fragment"
                );
                self.discards += 1;
                self.buffer.clear();
            }
        } else if !continues {
            if self.current.is_some() {
                debug!(
                    slice = header.slice,
                    fragment = header.fragment,
                    dropped = self.buffer.len(),
                    "video fragment out of order, slice discarded"
                );
                self.discards += 1;
            }
            self.current = None;
            self.buffer.clear();
            return Ok(SlicePush::Discarded);
        }

        self.buffer.extend_from_slice(&datagram[SliceHeader::SIZE..]);
        if header.last {
            self.current = None;
            self.slices += 1;
            return Ok(SlicePush::Complete(self.buffer.split().freeze()));
        }
        self.current = Some((header.slice, header.fragment.wrapping_add(1)));
        Ok(SlicePush::Pending)
    }

    /// Slices handed out so far.
    pub fn slices(&self) -> u64 {
        self.slices
    }

    /// Partial slices thrown away so far.
    pub fn discards(&self) -> u64 {
        self.discards
    }
}

// ── GapEstimator ─────────────────────────────────────────────────

/// Estimates how many datagrams went missing between two headers.
///
/// Uses the largest fragment number seen so far as the slice width,
/// so early estimates undercount.
#[derive(Debug, Default)]
pub struct GapEstimator {
    previous: Option<SliceHeader>,
    max_fragments: u8,
    lost: u64,
}

impl GapEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `header` and return the loss estimated since the last one.
    pub fn observe(&mut self, header: SliceHeader) -> u64 {
        self.max_fragments = self.max_fragments.max(header.fragment);
        let Some(prev) = self.previous.replace(header) else {
            return 0;
        };

        let changed = header.slice != prev.slice;
        let gap = (changed && header.slice != prev.slice.wrapping_add(1))
            || (changed && header.fragment != 0)
            || (!changed && header.fragment != prev.fragment + 1);
        if !gap {
            return 0;
        }

        let slices = header.slice.wrapping_sub(prev.slice) as i64;
        let estimate = slices * self.max_fragments as i64
            + (header.fragment as i64 - prev.fragment as i64 - 1);
        let estimate = estimate.max(0) as u64;
        self.lost += estimate;
        estimate
    }

    /// Sum of every estimate so far.
    pub fn total_lost(&self) -> u64 {
        self.lost
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dgram(slice: u8, fragment: u8, last: bool, body: &[u8]) -> Vec<u8> {
        let mut d = vec![slice, fragment | if last { 0x80 } else { 0 }];
        d.extend_from_slice(body);
        d
    }

    #[test]
    fn two_slices_in_order() {
        let mut a = SliceAssembler::new();
        assert_eq!(a.push(&dgram(0, 0, false, b"ab")).unwrap(), SlicePush::Pending);
        assert_eq!(
            a.push(&dgram(0, 1, true, b"cd")).unwrap(),
            SlicePush::Complete(Bytes::from_static(b"abcd"))
        );
        assert_eq!(a.push(&dgram(1, 0, false, b"ef")).unwrap(), SlicePush::Pending);
        assert_eq!(
            a.push(&dgram(1, 1, true, b"gh")).unwrap(),
            SlicePush::Complete(Bytes::from_static(b"efgh"))
        );
        assert_eq!(a.slices(), 2);
        assert_eq!(a.discards(), 0);
    }

    #[test]
    fn skipped_fragment_discards_slice() {
        let mut a = SliceAssembler::new();
        a.push(&dgram(1, 0, false, b"xx")).unwrap();
        assert_eq!(a.push(&dgram(1, 2, false, b"yy")).unwrap(), SlicePush::Discarded);
        assert_eq!(a.discards(), 1);

        // The tail of the broken slice never surfaces on its own.
        assert_eq!(a.push(&dgram(1, 3, true, b"zz")).unwrap(), SlicePush::Discarded);
        assert_eq!(a.discards(), 1);

        assert_eq!(
            a.push(&dgram(2, 0, true, b"ok")).unwrap(),
            SlicePush::Complete(Bytes::from_static(b"ok"))
        );
    }

    #[test]
    fn first_datagram_must_start_a_slice() {
        let mut a = SliceAssembler::new();
        assert_eq!(a.push(&dgram(5, 3, true, b"late")).unwrap(), SlicePush::Discarded);
        assert_eq!(a.discards(), 0);
    }

    #[test]
    fn new_slice_head_drops_unfinished_slice() {
        let mut a = SliceAssembler::new();
        a.push(&dgram(3, 0, false, b"old")).unwrap();
        assert_eq!(
            a.push(&dgram(4, 0, true, b"new")).unwrap(),
            SlicePush::Complete(Bytes::from_static(b"new"))
        );
        assert_eq!(a.discards(), 1);
    }

    #[test]
    fn short_datagram_is_malformed() {
        assert!(SliceAssembler::new().push(&[1]).is_err());
    }

    #[test]
    fn gap_estimates() {
        let h = |slice, fragment| SliceHeader { slice, fragment, last: false };
        let mut g = GapEstimator::new();
        assert_eq!(g.observe(h(0, 0)), 0);
        assert_eq!(g.observe(h(0, 1)), 0);
        assert_eq!(g.observe(h(0, 2)), 0);
        assert_eq!(g.observe(h(1, 0)), 0);
        // Lost (1,1) and (1,2).
        assert_eq!(g.observe(h(1, 3)), 2);
        // Skipped slice 2 entirely; width is now 3.
        assert_eq!(g.observe(h(3, 0)), 2 * 3 - 3 - 1);
        assert_eq!(g.total_lost(), 4);
    }

    #[test]
    fn gap_wraps_slice_ids() {
        let h = |slice, fragment| SliceHeader { slice, fragment, last: false };
        let mut g = GapEstimator::new();
        g.observe(h(255, 0));
        g.observe(h(255, 4));
        assert_eq!(g.observe(h(1, 0)), 2 * 4 - 4 - 1);
    }
}
