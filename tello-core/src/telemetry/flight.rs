//! The periodic flight-status message.
//!
//! ```text
//! offset  type  field
//! 0       i16   height (dm)
//! 2       i16   north speed
//! 4       i16   east speed
//! 6       i16   ground speed
//! 8       i16   fly time
//! 10      u8    SensorState bits
//! 11      u8    imu calibration state
//! 12      u8    battery percentage
//! 13      i16   battery left
//! 15      u16   fly time left
//! 17      u8    FlightState bits
//! 18      u8    fly mode
//! 19      u8    throw-fly timer
//! 20      u8    camera state
//! 21      u8    electrical machinery state
//! 22      u8    FrontSensor bits
//! 23      u8    bit 0: temperature height
//! ```

use bytes::Buf;
use serde::Serialize;

use crate::flags::{FlightState, FrontSensor, SensorState};

/// Encoded size of the flight-status payload.
pub const FLIGHT_MSG_LEN: usize = 24;

/// Well-known values of [`FlightData::fly_mode`].
pub mod fly_mode {
    pub const HOVERING: u8 = 6;
    pub const TAKING_OFF: u8 = 11;
    pub const LANDING: u8 = 12;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightData {
    pub height: i16,
    pub north_speed: i16,
    pub east_speed: i16,
    pub ground_speed: i16,
    pub fly_time: i16,
    pub sensors: SensorState,
    pub imu_calibration_state: u8,
    pub battery_percentage: u8,
    pub battery_left: i16,
    pub fly_time_left: u16,
    pub state: FlightState,
    pub fly_mode: u8,
    pub throw_fly_timer: u8,
    pub camera_state: u8,
    pub electrical_machinery_state: u8,
    pub front: FrontSensor,
    pub temperature_height: bool,
}

impl FlightData {
    /// Decode the fixed layout. Returns `None` for short payloads.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < FLIGHT_MSG_LEN {
            return None;
        }
        let mut b = data;
        Some(Self {
            height: b.get_i16_le(),
            north_speed: b.get_i16_le(),
            east_speed: b.get_i16_le(),
            ground_speed: b.get_i16_le(),
            fly_time: b.get_i16_le(),
            sensors: SensorState::from_bits_truncate(b.get_u8()),
            imu_calibration_state: b.get_u8(),
            battery_percentage: b.get_u8(),
            battery_left: b.get_i16_le(),
            fly_time_left: b.get_u16_le(),
            state: FlightState::from_bits_truncate(b.get_u8()),
            fly_mode: b.get_u8(),
            throw_fly_timer: b.get_u8(),
            camera_state: b.get_u8(),
            electrical_machinery_state: b.get_u8(),
            front: FrontSensor::from_bits_truncate(b.get_u8()),
            temperature_height: b.get_u8() & 1 == 1,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> [u8; FLIGHT_MSG_LEN] {
        let mut raw = [0u8; FLIGHT_MSG_LEN];
        raw[0..2].copy_from_slice(&12i16.to_le_bytes());
        raw[2..4].copy_from_slice(&(-3i16).to_le_bytes());
        raw[8..10].copy_from_slice(&95i16.to_le_bytes());
        raw[10] = 0b1000_0001;
        raw[12] = 87;
        raw[15..17].copy_from_slice(&600u16.to_le_bytes());
        raw[17] = 0b0010_1000;
        raw[18] = fly_mode::TAKING_OFF;
        raw[22] = 0b101;
        raw[23] = 1;
        raw
    }

    #[test]
    fn decodes_every_field_group() {
        let f = FlightData::decode(&sample()).unwrap();
        assert_eq!(f.height, 12);
        assert_eq!(f.north_speed, -3);
        assert_eq!(f.fly_time, 95);
        assert_eq!(f.sensors, SensorState::IMU | SensorState::WIND);
        assert_eq!(f.battery_percentage, 87);
        assert_eq!(f.fly_time_left, 600);
        assert!(f.state.contains(FlightState::HOVER));
        assert!(f.state.contains(FlightState::BATTERY_LOW));
        assert_eq!(f.fly_mode, fly_mode::TAKING_OFF);
        assert_eq!(f.front, FrontSensor::IN | FrontSensor::LSC);
        assert!(f.temperature_height);
    }

    #[test]
    fn short_payload_is_ignored() {
        assert!(FlightData::decode(&sample()[..23]).is_none());
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut long = sample().to_vec();
        long.extend_from_slice(&[0xff; 4]);
        assert_eq!(FlightData::decode(&long), FlightData::decode(&sample()));
    }
}
