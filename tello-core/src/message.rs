//! Message ids and packet-type tags of the control protocol.
//!
//! Uses proper enums with `TryFrom`. Unknown ids are legal on the wire,
//! so frames keep the raw `u16` and convert on demand.

use crate::error::TelloError;
use std::fmt;

// ── PacketType ───────────────────────────────────────────────────

/// The type tag carried in byte 4 of every outbound frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Ordinary command or query.
    Command = 0x68,
    /// Stick heartbeat and video start.
    Control = 0x60,
    /// Time sync and acknowledgements sent back to the device.
    Ack = 0x50,
    /// Camera settings and file-complete notification.
    Setting = 0x48,
    /// Flip manoeuvres.
    Flip = 0x70,
}

impl TryFrom<u8> for PacketType {
    type Error = TelloError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x68 => Ok(PacketType::Command),
            0x60 => Ok(PacketType::Control),
            0x50 => Ok(PacketType::Ack),
            0x48 => Ok(PacketType::Setting),
            0x70 => Ok(PacketType::Flip),
            _ => Err(TelloError::UnknownVariant {
                type_name: "PacketType",
                value: value as u64,
            }),
        }
    }
}

// ── MessageId ────────────────────────────────────────────────────

/// Every 16-bit command/message id the client knows about.
///
/// Ids below `0x100` are camera, flight and file traffic; the `0x105x`
/// block belongs to the flight controller's log channel and limits.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    // ── Wi-Fi (0x1x) ─────────────────────────────────────────────
    SsidMsg = 0x11,
    SsidCmd = 0x12,
    SsidPasswordMsg = 0x13,
    SsidPasswordCmd = 0x14,
    WifiRegionMsg = 0x15,
    WifiRegionCmd = 0x16,
    /// Periodic link quality report.
    WifiMsg = 0x1a,

    // ── Video / camera (0x2x-0x3x) ───────────────────────────────
    VideoEncoderRateCmd = 0x20,
    VideoDynAdjRateCmd = 0x21,
    EisCmd = 0x24,
    /// Ask the device to emit an SPS/PPS + key frame.
    VideoStartCmd = 0x25,
    VideoRateQuery = 0x28,
    TakePictureCmd = 0x30,
    /// Zoom (16:9) or normal (4:3) video mode.
    VideoModeCmd = 0x31,
    VideoRecordCmd = 0x32,
    ExposureCmd = 0x34,
    LightMsg = 0x35,
    JpegQualityMsg = 0x37,

    // ── Device info (0x4x) ───────────────────────────────────────
    Error1Msg = 0x43,
    Error2Msg = 0x44,
    VersionMsg = 0x45,
    TimeCmd = 0x46,
    ActivationTimeMsg = 0x47,
    LoaderVersionMsg = 0x49,

    // ── Flight (0x5x) ────────────────────────────────────────────
    /// Stick positions; doubles as the heartbeat.
    StickCmd = 0x50,
    TakeoffCmd = 0x54,
    LandCmd = 0x55,
    /// The 24-byte flight status report.
    FlightMsg = 0x56,
    SetAltLimitCmd = 0x58,
    FlipCmd = 0x5c,
    ThrowAndGoCmd = 0x5d,
    PalmLandCmd = 0x5e,

    // ── Files (0x6x) ─────────────────────────────────────────────
    FileSize = 0x62,
    FileData = 0x63,
    FileComplete = 0x64,

    // ── Smart video (0x8x) ───────────────────────────────────────
    SmartVideoCmd = 0x80,
    SmartVideoStatus = 0x81,

    // ── Flight controller (0x105x) ───────────────────────────────
    LogHeaderMsg = 0x1050,
    /// Concatenated log records; the richest telemetry source.
    LogDataMsg = 0x1051,
    LogConfigMsg = 0x1052,
    BounceCmd = 0x1053,
    CalibrateCmd = 0x1054,
    LowBatThresholdCmd = 0x1055,
    AltLimitMsg = 0x1056,
    LowBatThresholdMsg = 0x1057,
    AttLimitCmd = 0x1058,
    AttLimitMsg = 0x1059,
}

impl TryFrom<u16> for MessageId {
    type Error = TelloError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use MessageId::*;
        match value {
            0x11 => Ok(SsidMsg),
            0x12 => Ok(SsidCmd),
            0x13 => Ok(SsidPasswordMsg),
            0x14 => Ok(SsidPasswordCmd),
            0x15 => Ok(WifiRegionMsg),
            0x16 => Ok(WifiRegionCmd),
            0x1a => Ok(WifiMsg),

            0x20 => Ok(VideoEncoderRateCmd),
            0x21 => Ok(VideoDynAdjRateCmd),
            0x24 => Ok(EisCmd),
            0x25 => Ok(VideoStartCmd),
            0x28 => Ok(VideoRateQuery),
            0x30 => Ok(TakePictureCmd),
            0x31 => Ok(VideoModeCmd),
            0x32 => Ok(VideoRecordCmd),
            0x34 => Ok(ExposureCmd),
            0x35 => Ok(LightMsg),
            0x37 => Ok(JpegQualityMsg),

            0x43 => Ok(Error1Msg),
            0x44 => Ok(Error2Msg),
            0x45 => Ok(VersionMsg),
            0x46 => Ok(TimeCmd),
            0x47 => Ok(ActivationTimeMsg),
            0x49 => Ok(LoaderVersionMsg),

            0x50 => Ok(StickCmd),
            0x54 => Ok(TakeoffCmd),
            0x55 => Ok(LandCmd),
            0x56 => Ok(FlightMsg),
            0x58 => Ok(SetAltLimitCmd),
            0x5c => Ok(FlipCmd),
            0x5d => Ok(ThrowAndGoCmd),
            0x5e => Ok(PalmLandCmd),

            0x62 => Ok(FileSize),
            0x63 => Ok(FileData),
            0x64 => Ok(FileComplete),

            0x80 => Ok(SmartVideoCmd),
            0x81 => Ok(SmartVideoStatus),

            0x1050 => Ok(LogHeaderMsg),
            0x1051 => Ok(LogDataMsg),
            0x1052 => Ok(LogConfigMsg),
            0x1053 => Ok(BounceCmd),
            0x1054 => Ok(CalibrateCmd),
            0x1055 => Ok(LowBatThresholdCmd),
            0x1056 => Ok(AltLimitMsg),
            0x1057 => Ok(LowBatThresholdMsg),
            0x1058 => Ok(AttLimitCmd),
            0x1059 => Ok(AttLimitMsg),

            _ => Err(TelloError::UnknownVariant {
                type_name: "MessageId",
                value: value as u64,
            }),
        }
    }
}

impl From<MessageId> for u16 {
    fn from(id: MessageId) -> Self {
        id as u16
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#06x})", self, *self as u16)
    }
}

impl MessageId {
    /// Acknowledgements the device sends for commands we issued.
    /// The router drops them without further processing.
    pub fn is_command_ack(&self) -> bool {
        matches!(
            self,
            MessageId::TakeoffCmd
                | MessageId::LandCmd
                | MessageId::VideoStartCmd
                | MessageId::VideoEncoderRateCmd
                | MessageId::PalmLandCmd
                | MessageId::ExposureCmd
                | MessageId::LogConfigMsg
                | MessageId::SetAltLimitCmd
                | MessageId::AltLimitMsg
                | MessageId::StickCmd
                | MessageId::VideoModeCmd
                | MessageId::TakePictureCmd
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_roundtrip() {
        let ids = [
            MessageId::WifiMsg,
            MessageId::VideoStartCmd,
            MessageId::LightMsg,
            MessageId::TimeCmd,
            MessageId::StickCmd,
            MessageId::FlightMsg,
            MessageId::FileSize,
            MessageId::FileData,
            MessageId::FileComplete,
            MessageId::LogHeaderMsg,
            MessageId::LogDataMsg,
            MessageId::AttLimitMsg,
        ];
        for id in ids {
            assert_eq!(MessageId::try_from(id as u16).unwrap(), id);
        }
    }

    #[test]
    fn message_id_unknown() {
        let err = MessageId::try_from(0xbeef).unwrap_err();
        assert!(matches!(
            err,
            TelloError::UnknownVariant { value: 0xbeef, .. }
        ));
    }

    #[test]
    fn packet_type_tags() {
        assert_eq!(PacketType::Command as u8, 0x68);
        assert_eq!(PacketType::try_from(0x48).unwrap(), PacketType::Setting);
        assert!(PacketType::try_from(0x00).is_err());
    }

    #[test]
    fn display_includes_hex_id() {
        assert_eq!(MessageId::LogDataMsg.to_string(), "LogDataMsg(0x1051)");
    }

    #[test]
    fn acks_are_classified() {
        assert!(MessageId::TakeoffCmd.is_command_ack());
        assert!(!MessageId::FlightMsg.is_command_ack());
    }
}
