//! Name → accessor table over [`TelemetrySnapshot`].
//!
//! Indexes are stable for the life of the binary; callers that sample
//! the same sensors repeatedly should resolve names once with
//! [`sensor_index`] and then read through [`SENSORS`].

use crate::flags::{FlightState, FrontSensor, MvoValidity, SensorState};
use crate::telemetry::snapshot::TelemetrySnapshot;

/// A named scalar view of one snapshot field.
pub struct Sensor {
    pub name: &'static str,
    pub read: fn(&TelemetrySnapshot) -> f64,
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}

pub static SENSORS: &[Sensor] = &[
    // ── Flight status ────────────────────────────────────────────
    Sensor { name: "height", read: |s| s.flight.height as f64 },
    Sensor { name: "north_speed", read: |s| s.flight.north_speed as f64 },
    Sensor { name: "east_speed", read: |s| s.flight.east_speed as f64 },
    Sensor { name: "ground_speed", read: |s| s.flight.ground_speed as f64 },
    Sensor { name: "fly_time", read: |s| s.flight.fly_time as f64 },
    Sensor { name: "imu_state", read: |s| flag(s.flight.sensors.contains(SensorState::IMU)) },
    Sensor { name: "pressure_state", read: |s| flag(s.flight.sensors.contains(SensorState::PRESSURE)) },
    Sensor { name: "down_visual_state", read: |s| flag(s.flight.sensors.contains(SensorState::DOWN_VISUAL)) },
    Sensor { name: "power_state", read: |s| flag(s.flight.sensors.contains(SensorState::POWER)) },
    Sensor { name: "battery_state", read: |s| flag(s.flight.sensors.contains(SensorState::BATTERY)) },
    Sensor { name: "gravity_state", read: |s| flag(s.flight.sensors.contains(SensorState::GRAVITY)) },
    Sensor { name: "wind_state", read: |s| flag(s.flight.sensors.contains(SensorState::WIND)) },
    Sensor { name: "imu_calibration_state", read: |s| s.flight.imu_calibration_state as f64 },
    Sensor { name: "battery_percentage", read: |s| s.flight.battery_percentage as f64 },
    Sensor { name: "battery_left", read: |s| s.flight.battery_left as f64 },
    Sensor { name: "fly_time_left", read: |s| s.flight.fly_time_left as f64 },
    Sensor { name: "em_sky", read: |s| flag(s.flight.state.contains(FlightState::EM_SKY)) },
    Sensor { name: "em_ground", read: |s| flag(s.flight.state.contains(FlightState::EM_GROUND)) },
    Sensor { name: "em_open", read: |s| flag(s.flight.state.contains(FlightState::EM_OPEN)) },
    Sensor { name: "hover", read: |s| flag(s.flight.state.contains(FlightState::HOVER)) },
    Sensor { name: "outage_recording", read: |s| flag(s.flight.state.contains(FlightState::OUTAGE_RECORDING)) },
    Sensor { name: "battery_low", read: |s| flag(s.flight.state.contains(FlightState::BATTERY_LOW)) },
    Sensor { name: "battery_lower", read: |s| flag(s.flight.state.contains(FlightState::BATTERY_LOWER)) },
    Sensor { name: "factory_mode", read: |s| flag(s.flight.state.contains(FlightState::FACTORY_MODE)) },
    Sensor { name: "fly_mode", read: |s| s.flight.fly_mode as f64 },
    Sensor { name: "throw_fly_timer", read: |s| s.flight.throw_fly_timer as f64 },
    Sensor { name: "camera_state", read: |s| s.flight.camera_state as f64 },
    Sensor { name: "electrical_machinery_state", read: |s| s.flight.electrical_machinery_state as f64 },
    Sensor { name: "front_in", read: |s| flag(s.flight.front.contains(FrontSensor::IN)) },
    Sensor { name: "front_out", read: |s| flag(s.flight.front.contains(FrontSensor::OUT)) },
    Sensor { name: "front_lsc", read: |s| flag(s.flight.front.contains(FrontSensor::LSC)) },
    Sensor { name: "temperature_height", read: |s| flag(s.flight.temperature_height) },
    // ── Link ─────────────────────────────────────────────────────
    Sensor { name: "wifi_strength", read: |s| s.wifi_strength as f64 },
    Sensor { name: "wifi_disturb", read: |s| s.wifi_disturb as f64 },
    Sensor { name: "light_strength", read: |s| s.light_strength as f64 },
    // ── Visual odometry ──────────────────────────────────────────
    Sensor { name: "vel_x", read: |s| s.mvo.velocity[0] },
    Sensor { name: "vel_y", read: |s| s.mvo.velocity[1] },
    Sensor { name: "vel_z", read: |s| s.mvo.velocity[2] },
    Sensor { name: "pos_x", read: |s| s.mvo.position[0] as f64 },
    Sensor { name: "pos_y", read: |s| s.mvo.position[1] as f64 },
    Sensor { name: "pos_z", read: |s| s.mvo.position[2] as f64 },
    Sensor { name: "pos_uncertainty", read: |s| s.mvo.position_uncertainty as f64 },
    Sensor { name: "tof", read: |s| s.mvo.tof as f64 },
    Sensor { name: "tof_uncertainty", read: |s| s.mvo.tof_uncertainty as f64 },
    Sensor { name: "mvo_valid_vel_x", read: |s| flag(s.mvo.validity.contains(MvoValidity::VEL_X)) },
    Sensor { name: "mvo_valid_vel_y", read: |s| flag(s.mvo.validity.contains(MvoValidity::VEL_Y)) },
    Sensor { name: "mvo_valid_vel_z", read: |s| flag(s.mvo.validity.contains(MvoValidity::VEL_Z)) },
    Sensor { name: "mvo_valid_pos_x", read: |s| flag(s.mvo.validity.contains(MvoValidity::POS_X)) },
    Sensor { name: "mvo_valid_pos_y", read: |s| flag(s.mvo.validity.contains(MvoValidity::POS_Y)) },
    Sensor { name: "mvo_valid_pos_z", read: |s| flag(s.mvo.validity.contains(MvoValidity::POS_Z)) },
    // ── IMU ──────────────────────────────────────────────────────
    Sensor { name: "longitude", read: |s| s.imu.longitude },
    Sensor { name: "latitude", read: |s| s.imu.latitude },
    Sensor { name: "baro", read: |s| s.imu.baro as f64 },
    Sensor { name: "baro_smooth", read: |s| s.imu.baro_smooth as f64 },
    Sensor { name: "acc_x", read: |s| s.imu.acceleration[0] as f64 },
    Sensor { name: "acc_y", read: |s| s.imu.acceleration[1] as f64 },
    Sensor { name: "acc_z", read: |s| s.imu.acceleration[2] as f64 },
    Sensor { name: "gyro_x", read: |s| s.imu.gyro[0] as f64 },
    Sensor { name: "gyro_y", read: |s| s.imu.gyro[1] as f64 },
    Sensor { name: "gyro_z", read: |s| s.imu.gyro[2] as f64 },
    Sensor { name: "q_w", read: |s| s.imu.quaternion[0] as f64 },
    Sensor { name: "q_x", read: |s| s.imu.quaternion[1] as f64 },
    Sensor { name: "q_y", read: |s| s.imu.quaternion[2] as f64 },
    Sensor { name: "q_z", read: |s| s.imu.quaternion[3] as f64 },
    Sensor { name: "vel_n", read: |s| s.imu.velocity_ned[0] as f64 },
    Sensor { name: "vel_e", read: |s| s.imu.velocity_ned[1] as f64 },
    Sensor { name: "vel_d", read: |s| s.imu.velocity_ned[2] as f64 },
    Sensor { name: "yaw", read: |s| s.imu.euler.yaw },
    Sensor { name: "pitch", read: |s| s.imu.euler.pitch },
    Sensor { name: "roll", read: |s| s.imu.euler.roll },
    // ── IMU + visual odometry ────────────────────────────────────
    Sensor { name: "vel_x_vo", read: |s| s.imu_ext.velocity[0] as f64 },
    Sensor { name: "vel_y_vo", read: |s| s.imu_ext.velocity[1] as f64 },
    Sensor { name: "vel_z_vo", read: |s| s.imu_ext.velocity[2] as f64 },
    Sensor { name: "pos_x_vo", read: |s| s.imu_ext.position[0] as f64 },
    Sensor { name: "pos_y_vo", read: |s| s.imu_ext.position[1] as f64 },
    Sensor { name: "pos_z_vo", read: |s| s.imu_ext.position[2] as f64 },
    Sensor { name: "vel_vo", read: |s| s.imu_ext.speed as f64 },
    Sensor { name: "dist_vo", read: |s| s.imu_ext.distance as f64 },
    Sensor { name: "rtk_longitude_vo", read: |s| s.imu_ext.rtk_longitude },
    Sensor { name: "rtk_latitude_vo", read: |s| s.imu_ext.rtk_latitude },
    Sensor { name: "rtk_altitude_vo", read: |s| s.imu_ext.rtk_altitude as f64 },
    Sensor { name: "error_flag_vo", read: |s| s.imu_ext.error_flags as f64 },
];

/// Position of `name` in [`SENSORS`].
pub fn sensor_index(name: &str) -> Option<usize> {
    SENSORS.iter().position(|s| s.name == name)
}

/// Read one sensor by name.
pub fn read_sensor(snapshot: &TelemetrySnapshot, name: &str) -> Option<f64> {
    SENSORS
        .iter()
        .find(|s| s.name == name)
        .map(|s| (s.read)(snapshot))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = SENSORS.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), SENSORS.len());
    }

    #[test]
    fn reads_through_accessors() {
        let mut snap = TelemetrySnapshot::default();
        snap.flight.height = 17;
        snap.flight.state = FlightState::HOVER;
        snap.imu.euler.roll = -0.25;
        snap.wifi_strength = 90;

        assert_eq!(read_sensor(&snap, "height"), Some(17.0));
        assert_eq!(read_sensor(&snap, "hover"), Some(1.0));
        assert_eq!(read_sensor(&snap, "battery_low"), Some(0.0));
        assert_eq!(read_sensor(&snap, "roll"), Some(-0.25));
        assert_eq!(read_sensor(&snap, "wifi_strength"), Some(90.0));
        assert_eq!(read_sensor(&snap, "altitude"), None);
    }

    #[test]
    fn index_matches_table() {
        let idx = sensor_index("yaw").unwrap();
        assert_eq!(SENSORS[idx].name, "yaw");
        assert!(sensor_index("nope").is_none());
    }
}
