//! Outbound command frames.
//!
//! Each builder returns an unsent [`Frame`]; the control link assigns
//! the sequence number when it goes out. The stick command is the one
//! exception and is always sent with sequence 0.

use chrono::Timelike;

use crate::error::TelloError;
use crate::message::{MessageId, PacketType};
use crate::packet::Frame;

/// Stick neutral position on the 11-bit axis scale.
const AXIS_CENTER: f64 = 1024.0;
/// Deflection from centre at full stick.
const AXIS_RANGE: f64 = 660.0;
const AXIS_MASK: u64 = 0x7ff;

pub const EXPOSURE_RANGE: std::ops::RangeInclusive<i8> = -9..=9;
pub const BITRATE_MAX: u8 = 5;

// ── StickState ────────────────────────────────────────────────────

/// Current stick deflections, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StickState {
    pub left_right: f64,
    pub forward_backward: f64,
    pub up_down: f64,
    pub yaw: f64,
    pub fast_mode: bool,
}

impl StickState {
    /// Set all four axes from percentages, saturating outside ±100.
    pub fn set_percent(&mut self, left_right: f64, forward_backward: f64, up_down: f64, yaw: f64) {
        let clip = |v: f64| (v / 100.0).clamp(-1.0, 1.0);
        self.left_right = clip(left_right);
        self.forward_backward = clip(forward_backward);
        self.up_down = clip(up_down);
        self.yaw = clip(yaw);
    }

    /// Pack into the 48-bit little-endian stick word.
    pub fn packed(&self) -> [u8; 6] {
        let axis = |v: f64| (AXIS_CENTER + AXIS_RANGE * v.clamp(-1.0, 1.0)) as u64 & AXIS_MASK;
        let word = axis(self.left_right)
            | axis(self.forward_backward) << 11
            | axis(self.up_down) << 22
            | axis(self.yaw) << 33
            | (self.fast_mode as u64) << 44;
        let bytes = word.to_le_bytes();
        [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
    }

    /// Value of a named control, as reported by `sensor_values`.
    pub fn control(&self, name: &str) -> Option<f64> {
        Some(match name {
            "left_right" => self.left_right,
            "forward_backward" => self.forward_backward,
            "up_down" => self.up_down,
            "yaw" => self.yaw,
            "fast_mode" => self.fast_mode as u8 as f64,
            _ => return None,
        })
    }
}

/// Control names readable alongside telemetry sensors.
pub const CONTROL_NAMES: &[&str] = &["left_right", "forward_backward", "up_down", "yaw", "fast_mode"];

// ── Builders ──────────────────────────────────────────────────────

/// The heartbeat: stick word followed by the wall-clock stamp.
pub fn stick(state: &StickState, now: &impl Timelike) -> Frame {
    Frame::new(MessageId::StickCmd, PacketType::Control)
        .with_bytes(&state.packed())
        .with_time(now)
}

pub fn time_sync(now: &impl Timelike) -> Frame {
    Frame::new(MessageId::TimeCmd, PacketType::Ack)
        .with_u8(0)
        .with_time(now)
}

pub fn log_header_ack(id: [u8; 2]) -> Frame {
    Frame::new(MessageId::LogHeaderMsg, PacketType::Ack)
        .with_u8(0)
        .with_bytes(&id)
}

pub fn altitude_limit(metres: u16) -> Frame {
    Frame::new(MessageId::SetAltLimitCmd, PacketType::Command).with_u16(metres)
}

/// Ask the device to report its altitude limit back.
pub fn altitude_limit_query() -> Frame {
    Frame::new(MessageId::AltLimitMsg, PacketType::Command)
}

/// Battery percentage at which the device warns, `0..=100`.
pub fn low_battery_threshold(percent: u8) -> Result<Frame, TelloError> {
    if percent > 100 {
        return Err(TelloError::InvalidArgument(format!(
            "low battery threshold {percent} above 100"
        )));
    }
    Ok(Frame::new(MessageId::LowBatThresholdCmd, PacketType::Command).with_u8(percent))
}

pub fn low_battery_threshold_query() -> Frame {
    Frame::new(MessageId::LowBatThresholdMsg, PacketType::Command)
}

pub fn takeoff() -> Frame {
    Frame::new(MessageId::TakeoffCmd, PacketType::Command)
}

pub fn land() -> Frame {
    Frame::new(MessageId::LandCmd, PacketType::Command).with_u8(0)
}

pub fn take_picture() -> Frame {
    Frame::new(MessageId::TakePictureCmd, PacketType::Command)
}

/// Request an SPS/PPS and key frame.
pub fn video_start() -> Frame {
    Frame::new(MessageId::VideoStartCmd, PacketType::Control)
}

pub fn video_mode(zoom: bool) -> Frame {
    Frame::new(MessageId::VideoModeCmd, PacketType::Command).with_u8(zoom as u8)
}

pub fn exposure(level: i8) -> Result<Frame, TelloError> {
    if !EXPOSURE_RANGE.contains(&level) {
        return Err(TelloError::InvalidArgument(format!(
            "exposure {level} outside {EXPOSURE_RANGE:?}"
        )));
    }
    Ok(Frame::new(MessageId::ExposureCmd, PacketType::Setting).with_u8((level + 9) as u8))
}

/// `0` lets the device pick; `1..=5` are fixed rates.
pub fn video_bitrate(rate: u8) -> Result<Frame, TelloError> {
    if rate > BITRATE_MAX {
        return Err(TelloError::InvalidArgument(format!(
            "bitrate {rate} outside 0..={BITRATE_MAX}"
        )));
    }
    Ok(Frame::new(MessageId::VideoEncoderRateCmd, PacketType::Command).with_u8(rate))
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn neutral_sticks_pack_to_center() {
        let packed = StickState::default().packed();
        let mut word = [0u8; 8];
        word[..6].copy_from_slice(&packed);
        let word = u64::from_le_bytes(word);
        for shift in [0, 11, 22, 33] {
            assert_eq!((word >> shift) & AXIS_MASK, 1024);
        }
        assert_eq!(word >> 44, 0);
    }

    #[test]
    fn full_deflection_and_fast_mode() {
        let mut s = StickState::default();
        s.set_percent(100.0, -100.0, 250.0, 0.0);
        s.fast_mode = true;
        assert_eq!(s.up_down, 1.0);

        let mut word = [0u8; 8];
        word[..6].copy_from_slice(&s.packed());
        let word = u64::from_le_bytes(word);
        assert_eq!(word & AXIS_MASK, 1684);
        assert_eq!((word >> 11) & AXIS_MASK, 364);
        assert_eq!((word >> 22) & AXIS_MASK, 1684);
        assert_eq!((word >> 44) & 1, 1);
    }

    #[test]
    fn stick_frame_layout() {
        let t = NaiveTime::from_hms_opt(1, 2, 3).unwrap();
        let f = stick(&StickState::default(), &t);
        assert_eq!(f.packet_type(), 0x60);
        assert_eq!(f.payload().len(), 16);
        assert_eq!(&f.payload()[6..10], &[1, 0, 2, 0]);
    }

    #[test]
    fn controls_by_name() {
        let mut s = StickState::default();
        s.set_percent(50.0, 0.0, 0.0, -20.0);
        assert_eq!(s.control("left_right"), Some(0.5));
        assert_eq!(s.control("yaw"), Some(-0.2));
        assert_eq!(s.control("fast_mode"), Some(0.0));
        assert_eq!(s.control("throttle"), None);
        assert!(CONTROL_NAMES.iter().all(|n| s.control(n).is_some()));
    }

    #[test]
    fn camera_settings_validate_range() {
        assert_eq!(exposure(0).unwrap().payload(), &[9]);
        assert_eq!(exposure(-9).unwrap().payload(), &[0]);
        assert!(exposure(10).is_err());
        assert_eq!(video_bitrate(4).unwrap().payload(), &[4]);
        assert!(video_bitrate(6).is_err());
    }

    #[test]
    fn fixed_payloads() {
        assert_eq!(altitude_limit(30).payload(), &[0x1e, 0x00]);
        assert_eq!(land().payload(), &[0]);
        assert!(takeoff().payload().is_empty());
        assert_eq!(video_start().packet_type(), 0x60);
        assert_eq!(video_mode(true).payload(), &[1]);
        assert_eq!(log_header_ack([0x34, 0x12]).payload(), &[0, 0x34, 0x12]);
    }

    #[test]
    fn device_limit_settings() {
        let alt = altitude_limit(120);
        assert_eq!(alt.raw_id(), 0x58);
        assert_eq!(alt.payload(), &[120, 0]);

        let query = altitude_limit_query();
        assert_eq!(query.raw_id(), 0x1056);
        assert_eq!(query.packet_type(), 0x68);
        assert!(query.payload().is_empty());

        let bat = low_battery_threshold(25).unwrap();
        assert_eq!(bat.raw_id(), 0x1055);
        assert_eq!(bat.payload(), &[25]);
        assert!(low_battery_threshold(101).is_err());

        let query = low_battery_threshold_query();
        assert_eq!(query.raw_id(), 0x1057);
        assert!(query.payload().is_empty());
    }
}
