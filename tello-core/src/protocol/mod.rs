//! Payload-level protocol: outbound command builders and the
//! device-pushed file transfer.

pub mod control;
pub mod file;

pub use control::{CONTROL_NAMES, StickState};
pub use file::{
    FileAnnouncement, FileFragment, FileTransfers, FragmentProgress, PendingFileTransfer,
    ReceivedFile,
};
