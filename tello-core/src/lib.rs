//! # tello-core
//!
//! Client library for the Tello's binary UDP control protocol.
//!
//! This crate contains:
//! - **Wire format**: `crc`, `header`, `packet` and `message` for framing,
//!   checksums and the handshake literal
//! - **Telemetry**: decoders for the flight-status message and the
//!   log-record stream, feeding one `TelemetrySnapshot`
//! - **Protocol**: outbound command builders and device-pushed file transfer
//! - **Video**: slice reassembly, the byte pipe into an external decoder,
//!   and the latest-frame mailbox
//! - **State/Event**: the connection state machine and the event dispatcher
//! - **Client**: `Tello`, which owns all of the above and the loops
//! - **Error**: `TelloError`, a typed `thiserror` enum

pub mod client;
pub mod config;
pub mod crc;
pub mod error;
pub mod event;
pub mod flags;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod state;
pub mod telemetry;
pub mod video;

mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::Tello;
pub use config::TelloConfig;
pub use error::TelloError;
pub use event::{Dispatcher, Event, Payload, Subscriber, Topic};
pub use message::{MessageId, PacketType};
pub use packet::{Frame, Inbound};
pub use protocol::{ReceivedFile, StickState};
pub use state::{ConnectionState, ConnectionStateMachine};
pub use telemetry::{FlightData, TelemetrySnapshot};
pub use video::{
    DecodedFrame, DecoderFactory, NumberedFrame, PixelFormat, StreamReader, VideoDecoder,
    VideoRecorder,
};
