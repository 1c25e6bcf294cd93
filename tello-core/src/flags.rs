//! Bitfields carried by the flight-status message and the visual
//! odometry log record.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Byte 10 of the flight-status message. Bit 6 is unused.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SensorState: u8 {
        const IMU = 1 << 0;
        const PRESSURE = 1 << 1;
        const DOWN_VISUAL = 1 << 2;
        const POWER = 1 << 3;
        const BATTERY = 1 << 4;
        const GRAVITY = 1 << 5;
        const WIND = 1 << 7;
    }
}

bitflags! {
    /// Byte 17 of the flight-status message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FlightState: u8 {
        const EM_SKY = 1 << 0;
        const EM_GROUND = 1 << 1;
        const EM_OPEN = 1 << 2;
        const HOVER = 1 << 3;
        const OUTAGE_RECORDING = 1 << 4;
        const BATTERY_LOW = 1 << 5;
        const BATTERY_LOWER = 1 << 6;
        const FACTORY_MODE = 1 << 7;
    }
}

bitflags! {
    /// Byte 22 of the flight-status message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FrontSensor: u8 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
        const LSC = 1 << 2;
    }
}

bitflags! {
    /// Validity mask of the visual odometry record: the low three bits
    /// gate the velocity axes, bits 4..=6 the position axes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MvoValidity: u8 {
        const VEL_X = 1 << 0;
        const VEL_Y = 1 << 1;
        const VEL_Z = 1 << 2;
        const POS_X = 1 << 4;
        const POS_Y = 1 << 5;
        const POS_Z = 1 << 6;
    }
}

impl MvoValidity {
    /// Per-axis velocity validity (x, y, z).
    pub fn velocity(&self) -> [bool; 3] {
        [
            self.contains(Self::VEL_X),
            self.contains(Self::VEL_Y),
            self.contains(Self::VEL_Z),
        ]
    }

    /// Per-axis position validity (x, y, z).
    pub fn position(&self) -> [bool; 3] {
        [
            self.contains(Self::POS_X),
            self.contains(Self::POS_Y),
            self.contains(Self::POS_Z),
        ]
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_bits_are_dropped() {
        let s = SensorState::from_bits_truncate(0xff);
        assert!(s.contains(SensorState::WIND));
        assert_eq!(s.bits(), 0xbf);
    }

    #[test]
    fn mvo_axes() {
        let v = MvoValidity::from_bits_truncate(0b0101_0011);
        assert_eq!(v.velocity(), [true, true, false]);
        assert_eq!(v.position(), [true, false, true]);
    }
}
