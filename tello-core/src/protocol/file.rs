//! Device-pushed file transfer (photos).
//!
//! # Wire Protocol
//!
//! ```text
//! Device ──[FileSize]──────────────────────► Client
//!   Payload: _ u8, size u32, file_id u16
//! Client ──[FileSize]──────────────────────► Device   (datagram echoed back)
//!
//! Device ──[FileData]──────────────────────► Client   (repeated, any order)
//!   Payload: file_id u16, group u32, fragment u32, len u16, data[len]
//! Client ──[FileData, Ack]─────────────────► Device   (once per full group)
//!   Payload: 0 u8, file_id u16, group u32
//!
//! Client ──[FileSize, Ack]─────────────────► Device   (file done)
//!   Payload: 0 u8
//! Client ──[FileComplete, Setting]─────────► Device
//!   Payload: 0 u16, size u32
//! ```
//!
//! Fragments are 1024 bytes; eight fragments make a group, tracked by one
//! bitmap byte. A short final group never fills its byte, so whole-file
//! completion is decided by the received byte count instead.

use std::collections::HashMap;

use bytes::{Buf, Bytes};
use tracing::{debug, info, warn};

use crate::error::TelloError;
use crate::message::{MessageId, PacketType};
use crate::packet::Frame;

/// Bytes per fragment.
pub const FRAGMENT_SIZE: usize = 1024;

/// Fragments tracked by one bitmap byte.
pub const FRAGMENTS_PER_GROUP: usize = 8;

/// Fixed part of a `FileData` payload.
const FRAGMENT_HEADER_SIZE: usize = 12;

// ── Wire messages ─────────────────────────────────────────────────

/// The `FileSize` announcement that opens a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAnnouncement {
    pub file_id: u16,
    pub size: u32,
}

impl FileAnnouncement {
    pub const SIZE: usize = 7;

    pub fn decode(payload: &[u8]) -> Result<Self, TelloError> {
        if payload.len() < Self::SIZE {
            return Err(TelloError::MalformedFrame("file announcement too short"));
        }
        let mut b = &payload[1..];
        let size = b.get_u32_le();
        let file_id = b.get_u16_le();
        Ok(Self { file_id, size })
    }
}

/// One `FileData` datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFragment {
    pub file_id: u16,
    pub group: u32,
    /// Absolute fragment number; `fragment % 8` is the bit in the group.
    pub fragment: u32,
    pub data: Bytes,
}

impl FileFragment {
    pub fn decode(payload: &[u8]) -> Result<Self, TelloError> {
        if payload.len() < FRAGMENT_HEADER_SIZE {
            return Err(TelloError::MalformedFrame("file fragment header too short"));
        }
        let mut b = payload;
        let file_id = b.get_u16_le();
        let group = b.get_u32_le();
        let fragment = b.get_u32_le();
        let len = b.get_u16_le() as usize;
        if b.len() < len {
            return Err(TelloError::MalformedFrame("file fragment data truncated"));
        }
        Ok(Self {
            file_id,
            group,
            fragment,
            data: Bytes::copy_from_slice(&b[..len]),
        })
    }

    pub fn index_in_group(&self) -> usize {
        self.fragment as usize % FRAGMENTS_PER_GROUP
    }
}

/// Ack for a fully received group.
pub fn group_ack(file_id: u16, group: u32) -> Frame {
    Frame::new(MessageId::FileData, PacketType::Ack)
        .with_u8(0)
        .with_u16(file_id)
        .with_u32(group)
}

/// The two frames that close a transfer.
pub fn completion_frames(size: u32) -> [Frame; 2] {
    [
        Frame::new(MessageId::FileSize, PacketType::Ack).with_u8(0),
        Frame::new(MessageId::FileComplete, PacketType::Setting)
            .with_u16(0)
            .with_u32(size),
    ]
}

// ── PendingFileTransfer ───────────────────────────────────────────

/// Accumulates one file from out-of-order fragments.
#[derive(Debug, Clone)]
pub struct PendingFileTransfer {
    file_id: u16,
    size: usize,
    bytes_received: usize,
    groups: Vec<u8>,
    buffer: Vec<u8>,
}

impl PendingFileTransfer {
    pub fn new(file_id: u16, size: usize) -> Self {
        let fragments = size.div_ceil(FRAGMENT_SIZE);
        let groups = fragments.div_ceil(FRAGMENTS_PER_GROUP).max(1);
        Self {
            file_id,
            size,
            bytes_received: 0,
            groups: vec![0; groups],
            buffer: Vec::with_capacity(size),
        }
    }

    pub fn file_id(&self) -> u16 {
        self.file_id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn has_fragment(&self, group: usize, index: usize) -> bool {
        self.groups
            .get(group)
            .is_some_and(|bits| bits & (1 << (index % FRAGMENTS_PER_GROUP)) != 0)
    }

    /// Store one fragment.
    ///
    /// Returns `Ok(true)` when this fragment completed its group's bitmap
    /// byte. Duplicates return `Ok(false)` without touching the count.
    pub fn receive_fragment(
        &mut self,
        group: usize,
        index: usize,
        byte_length: usize,
        data: &[u8],
    ) -> Result<bool, TelloError> {
        if group >= self.groups.len() || index >= FRAGMENTS_PER_GROUP {
            return Err(TelloError::MalformedFrame("file fragment out of range"));
        }
        if self.has_fragment(group, index) {
            return Ok(false);
        }

        let offset = (group * FRAGMENTS_PER_GROUP + index) * FRAGMENT_SIZE;
        let end = offset + data.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[offset..end].copy_from_slice(data);

        self.bytes_received += byte_length;
        self.groups[group] |= 1 << index;
        Ok(self.groups[group] == 0xff)
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_received >= self.size
    }

    /// The assembled file, truncated to the announced size.
    pub fn into_data(mut self) -> Bytes {
        self.buffer.truncate(self.size);
        Bytes::from(self.buffer)
    }
}

// ── FileTransfers ─────────────────────────────────────────────────

/// A file handed to subscribers once every byte has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub file_id: u16,
    pub data: Bytes,
}

/// What one fragment changed.
#[derive(Debug, Default)]
pub struct FragmentProgress {
    pub group_complete: bool,
    pub file: Option<ReceivedFile>,
}

/// In-flight transfers keyed by device-assigned file id.
#[derive(Debug, Default)]
pub struct FileTransfers {
    pending: HashMap<u16, PendingFileTransfer>,
}

impl FileTransfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a transfer. The device sends one file at a
    /// time, so any other transfer still open is abandoned.
    pub fn announce(&mut self, announcement: FileAnnouncement) {
        info!(
            file_id = announcement.file_id,
            size = announcement.size,
            "file transfer announced"
        );
        let stale: Vec<u16> = self
            .pending
            .keys()
            .copied()
            .filter(|id| *id != announcement.file_id)
            .collect();
        for file_id in stale {
            if let Some(t) = self.abandon(file_id) {
                warn!(
                    file_id,
                    received = t.bytes_received(),
                    size = t.size(),
                    "abandoning unfinished file"
                );
            }
        }
        let previous = self.pending.insert(
            announcement.file_id,
            PendingFileTransfer::new(announcement.file_id, announcement.size as usize),
        );
        if previous.is_some() {
            warn!(file_id = announcement.file_id, "restarting file transfer");
        }
    }

    /// Feed a fragment. Fragments for unknown ids are ignored.
    pub fn receive(&mut self, fragment: &FileFragment) -> Result<FragmentProgress, TelloError> {
        let Some(transfer) = self.pending.get_mut(&fragment.file_id) else {
            debug!(file_id = fragment.file_id, "fragment for unknown file");
            return Ok(FragmentProgress::default());
        };

        let group_complete = transfer.receive_fragment(
            fragment.group as usize,
            fragment.index_in_group(),
            fragment.data.len(),
            &fragment.data,
        )?;

        let file = if transfer.is_complete() {
            self.pending.remove(&fragment.file_id).map(|t| ReceivedFile {
                file_id: t.file_id(),
                data: t.into_data(),
            })
        } else {
            None
        };
        Ok(FragmentProgress {
            group_complete,
            file,
        })
    }

    /// Drop a transfer without completing it.
    pub fn abandon(&mut self, file_id: u16) -> Option<PendingFileTransfer> {
        self.pending.remove(&file_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_completes_once_in_reverse_order() {
        let mut t = PendingFileTransfer::new(1, 16 * FRAGMENT_SIZE);
        let chunk = vec![0x11; FRAGMENT_SIZE];

        let mut completions = Vec::new();
        for index in (0..8).rev() {
            completions.push(t.receive_fragment(0, index, FRAGMENT_SIZE, &chunk).unwrap());
        }
        assert_eq!(completions, [false, false, false, false, false, false, false, true]);
        assert_eq!(t.bytes_received(), 8 * FRAGMENT_SIZE);
    }

    #[test]
    fn duplicates_do_not_double_count() {
        let mut t = PendingFileTransfer::new(1, 8 * FRAGMENT_SIZE);
        let chunk = vec![0; FRAGMENT_SIZE];
        for index in 0..8 {
            t.receive_fragment(0, index, FRAGMENT_SIZE, &chunk).unwrap();
        }
        let before = t.bytes_received();
        for index in 0..8 {
            assert!(!t.receive_fragment(0, index, FRAGMENT_SIZE, &chunk).unwrap());
        }
        assert_eq!(t.bytes_received(), before);
    }

    #[test]
    fn fragments_land_at_their_offset() {
        let mut t = PendingFileTransfer::new(9, 2 * FRAGMENT_SIZE + 10);
        t.receive_fragment(0, 2, 10, &[7; 10]).unwrap();
        t.receive_fragment(0, 0, FRAGMENT_SIZE, &[1; FRAGMENT_SIZE]).unwrap();
        assert!(!t.is_complete());
        t.receive_fragment(0, 1, FRAGMENT_SIZE, &[2; FRAGMENT_SIZE]).unwrap();
        assert!(t.is_complete());

        let data = t.into_data();
        assert_eq!(data.len(), 2 * FRAGMENT_SIZE + 10);
        assert_eq!(data[0], 1);
        assert_eq!(data[FRAGMENT_SIZE], 2);
        assert_eq!(data[2 * FRAGMENT_SIZE + 9], 7);
    }

    #[test]
    fn out_of_range_group_is_rejected() {
        let mut t = PendingFileTransfer::new(1, FRAGMENT_SIZE);
        assert!(t.receive_fragment(3, 0, 4, &[0; 4]).is_err());
    }

    #[test]
    fn decodes_wire_messages() {
        let ann = FileAnnouncement::decode(&[0, 0x00, 0x30, 0x00, 0x00, 0x05, 0x00]).unwrap();
        assert_eq!(ann, FileAnnouncement { file_id: 5, size: 0x3000 });
        assert!(FileAnnouncement::decode(&[0; 6]).is_err());

        let mut raw = Vec::new();
        raw.extend_from_slice(&5u16.to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&10u32.to_le_bytes());
        raw.extend_from_slice(&3u16.to_le_bytes());
        raw.extend_from_slice(b"abc");
        let frag = FileFragment::decode(&raw).unwrap();
        assert_eq!(frag.group, 1);
        assert_eq!(frag.index_in_group(), 2);
        assert_eq!(&frag.data[..], b"abc");

        raw.truncate(raw.len() - 1);
        assert!(FileFragment::decode(&raw).is_err());
    }

    #[test]
    fn registry_hands_over_completed_file() {
        let mut files = FileTransfers::new();
        files.announce(FileAnnouncement { file_id: 2, size: 5 });

        let progress = files
            .receive(&FileFragment {
                file_id: 2,
                group: 0,
                fragment: 0,
                data: Bytes::from_static(b"hello"),
            })
            .unwrap();
        assert!(!progress.group_complete);
        assert_eq!(progress.file.unwrap().data, Bytes::from_static(b"hello"));
        assert!(files.is_empty());
    }

    #[test]
    fn new_announcement_abandons_unfinished_file() {
        let mut files = FileTransfers::new();
        files.announce(FileAnnouncement { file_id: 1, size: 4000 });
        let first = FileFragment {
            file_id: 1,
            group: 0,
            fragment: 0,
            data: Bytes::from(vec![1u8; FRAGMENT_SIZE]),
        };
        assert!(files.receive(&first).unwrap().file.is_none());

        files.announce(FileAnnouncement { file_id: 2, size: 10 });
        assert_eq!(files.len(), 1);
        assert!(files.abandon(1).is_none());

        // Late fragments of the dropped file are ignored.
        let progress = files.receive(&first).unwrap();
        assert!(!progress.group_complete);
        assert!(progress.file.is_none());
    }

    #[test]
    fn ack_payloads() {
        assert_eq!(group_ack(5, 3).payload(), &[0, 5, 0, 3, 0, 0, 0]);
        let [done, complete] = completion_frames(0x0102);
        assert_eq!(done.payload(), &[0]);
        assert_eq!(complete.payload(), &[0, 0, 0x02, 0x01, 0, 0]);
        assert_eq!(complete.packet_type(), PacketType::Setting as u8);
    }
}
