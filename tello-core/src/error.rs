//! Error types for the Tello control protocol.
//!
//! Transient wire problems (`MalformedFrame`, `CorruptedTelemetryStream`,
//! `CodecDecodeError`) are absorbed by the loops that hit them. The
//! remaining variants surface to whoever made the explicit request.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the Tello client.
#[derive(Debug, Error)]
pub enum TelloError {
    // ── Wire Errors ──────────────────────────────────────────────
    /// A datagram did not decode as a frame (marker, length or CRC).
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// The log-record stream lost sync or did not end where expected.
    #[error("corrupted telemetry stream at offset {offset}")]
    CorruptedTelemetryStream { offset: usize },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    // ── Session Errors ───────────────────────────────────────────
    /// No response arrived within a receive window.
    #[error("no response within {0:?}")]
    ProtocolTimeout(Duration),

    /// `connect` gave up waiting for the handshake or the first log message.
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// The request is not allowed in the current device state.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// The client is not in a state where the call makes sense.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A caller-supplied value is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ── Video Errors ─────────────────────────────────────────────
    /// The external codec could not be opened within the retry budget.
    #[error("video codec failed to open after {attempts} attempts: {last_error}")]
    CodecOpenFailure { attempts: u32, last_error: String },

    /// The external codec rejected a unit.
    #[error("video decode error: {0}")]
    CodecDecodeError(String),

    // ── Runtime Errors ───────────────────────────────────────────
    /// The UDP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// A background loop panicked or was aborted.
    #[error("loop failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<tokio::sync::watch::error::RecvError> for TelloError {
    fn from(_: tokio::sync::watch::error::RecvError) -> Self {
        TelloError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for TelloError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        TelloError::ChannelClosed
    }
}

// ── Tests ────────────────────────────────────────────────────────
