//! Log records the decoder understands.
//!
//! All offsets are into the XOR-decoded record payload, little-endian.

use std::f64::consts::FRAC_PI_2;

use bytes::Buf;
use serde::Serialize;

use crate::flags::MvoValidity;

/// Record id of the visual odometry feedback.
pub const ID_MVO_FEEDBACK: u16 = 29;
/// Record id of the IMU attitude record.
pub const ID_IMU_ATTI: u16 = 0x800;
/// Record id of the IMU record extended with visual odometry.
pub const ID_IMU_EXT: u16 = 0x810;

fn f32_at(p: &[u8], offset: usize) -> f32 {
    (&p[offset..]).get_f32_le()
}

fn f64_at(p: &[u8], offset: usize) -> f64 {
    (&p[offset..]).get_f64_le()
}

fn f32x3_at(p: &[u8], offset: usize) -> [f32; 3] {
    [f32_at(p, offset), f32_at(p, offset + 4), f32_at(p, offset + 8)]
}

// ── MvoFeedback ──────────────────────────────────────────────────

/// Visual odometry feedback (record 29).
///
/// ```text
/// 2   3 × i16  velocity, mm/s
/// 8   3 × f32  position
/// 20  f32      position uncertainty (scaled ×10000)
/// 20  6 × f32  position covariance
/// 44  6 × f32  velocity covariance
/// 68  f32      time of flight
/// 72  f32      time of flight uncertainty
/// 76  u8       MvoValidity
/// ```
///
/// The uncertainty and the first covariance term share offset 20.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MvoFeedback {
    /// m/s.
    pub velocity: [f64; 3],
    pub position: [f32; 3],
    pub position_uncertainty: f32,
    pub position_covariance: [f32; 6],
    pub velocity_covariance: [f32; 6],
    pub tof: f32,
    pub tof_uncertainty: f32,
    pub validity: MvoValidity,
}

impl MvoFeedback {
    pub const MIN_LEN: usize = 77;

    pub fn decode(p: &[u8]) -> Option<Self> {
        if p.len() < Self::MIN_LEN {
            return None;
        }
        let mut vel = &p[2..8];
        let velocity = [
            vel.get_i16_le() as f64 / 1000.0,
            vel.get_i16_le() as f64 / 1000.0,
            vel.get_i16_le() as f64 / 1000.0,
        ];
        let mut position_covariance = [0f32; 6];
        let mut velocity_covariance = [0f32; 6];
        for i in 0..6 {
            position_covariance[i] = f32_at(p, 20 + 4 * i);
            velocity_covariance[i] = f32_at(p, 44 + 4 * i);
        }
        Some(Self {
            velocity,
            position: f32x3_at(p, 8),
            position_uncertainty: f32_at(p, 20) * 10000.0,
            position_covariance,
            velocity_covariance,
            tof: f32_at(p, 68),
            tof_uncertainty: f32_at(p, 72),
            validity: MvoValidity::from_bits_truncate(p[76]),
        })
    }
}

// ── ImuAttitude ──────────────────────────────────────────────────

/// IMU attitude (record 0x800).
///
/// ```text
/// 0   f64      longitude
/// 8   f64      latitude
/// 16  f32      barometric altitude
/// 20  3 × f32  accelerometer
/// 32  3 × f32  gyroscope
/// 44  f32      smoothed barometer
/// 48  4 × f32  quaternion w, x, y, z
/// 76  3 × f32  velocity north, east, down
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImuAttitude {
    pub longitude: f64,
    pub latitude: f64,
    pub baro: f32,
    pub acceleration: [f32; 3],
    pub gyro: [f32; 3],
    pub baro_smooth: f32,
    /// w, x, y, z.
    pub quaternion: [f32; 4],
    pub velocity_ned: [f32; 3],
    pub euler: EulerAngles,
}

impl ImuAttitude {
    pub const MIN_LEN: usize = 88;

    pub fn decode(p: &[u8]) -> Option<Self> {
        if p.len() < Self::MIN_LEN {
            return None;
        }
        let quaternion = [f32_at(p, 48), f32_at(p, 52), f32_at(p, 56), f32_at(p, 60)];
        let [w, x, y, z] = quaternion.map(f64::from);
        Some(Self {
            longitude: f64_at(p, 0),
            latitude: f64_at(p, 8),
            baro: f32_at(p, 16),
            acceleration: f32x3_at(p, 20),
            gyro: f32x3_at(p, 32),
            baro_smooth: f32_at(p, 44),
            quaternion,
            velocity_ned: f32x3_at(p, 76),
            euler: EulerAngles::from_quaternion(w, x, y, z),
        })
    }
}

// ── ImuExtended ──────────────────────────────────────────────────

/// IMU extended with visual odometry (record 0x810).
///
/// ```text
/// 0   3 × f32  velocity
/// 12  3 × f32  position
/// 24  f32      combined velocity
/// 28  f32      distance
/// 32  f64      RTK longitude
/// 40  f64      RTK latitude
/// 48  f32      RTK altitude
/// 52  i16      error flags
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImuExtended {
    pub velocity: [f32; 3],
    pub position: [f32; 3],
    pub speed: f32,
    pub distance: f32,
    pub rtk_longitude: f64,
    pub rtk_latitude: f64,
    pub rtk_altitude: f32,
    pub error_flags: i16,
}

impl ImuExtended {
    pub const MIN_LEN: usize = 54;

    pub fn decode(p: &[u8]) -> Option<Self> {
        if p.len() < Self::MIN_LEN {
            return None;
        }
        Some(Self {
            velocity: f32x3_at(p, 0),
            position: f32x3_at(p, 12),
            speed: f32_at(p, 24),
            distance: f32_at(p, 28),
            rtk_longitude: f64_at(p, 32),
            rtk_latitude: f64_at(p, 40),
            rtk_altitude: f32_at(p, 48),
            error_flags: (&p[52..]).get_i16_le(),
        })
    }
}

// ── EulerAngles ──────────────────────────────────────────────────

/// Yaw, pitch and roll in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EulerAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl EulerAngles {
    /// Convert a (not necessarily normalised) quaternion.
    ///
    /// Within 0.1% of the poles the decomposition degenerates, so pitch
    /// is pinned to ±π/2 and the whole rotation is folded into yaw.
    pub fn from_quaternion(w: f64, x: f64, y: f64, z: f64) -> Self {
        let (sq_w, sq_x, sq_y, sq_z) = (w * w, x * x, y * y, z * z);
        let unit = sq_w + sq_x + sq_y + sq_z;
        let test = w * x + y * z;

        if test > 0.499 * unit {
            return Self {
                yaw: 2.0 * y.atan2(w),
                pitch: FRAC_PI_2,
                roll: 0.0,
            };
        }
        if test < -0.499 * unit {
            return Self {
                yaw: -2.0 * y.atan2(w),
                pitch: -FRAC_PI_2,
                roll: 0.0,
            };
        }

        let yaw = (2.0 * (w * z - x * y)).atan2(1.0 - 2.0 * (sq_z + sq_x));
        let roll = if unit == 0.0 {
            0.0
        } else {
            (2.0 * test / unit).asin()
        };
        let pitch = (2.0 * (w * y - x * z)).atan2(1.0 - 2.0 * (sq_y + sq_x));
        Self { yaw, pitch, roll }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn put_f32(buf: &mut [u8], offset: usize, v: f32) {
        buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    #[test]
    fn identity_quaternion_is_level() {
        let e = EulerAngles::from_quaternion(1.0, 0.0, 0.0, 0.0);
        assert_eq!(e, EulerAngles { yaw: 0.0, pitch: 0.0, roll: 0.0 });
    }

    #[test]
    fn north_pole_pins_pitch() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let e = EulerAngles::from_quaternion(h, h, 0.0, 0.0);
        assert_eq!(e.pitch, FRAC_PI_2);
        assert_eq!(e.roll, 0.0);
        assert_eq!(e.yaw, 0.0);
    }

    #[test]
    fn south_pole_pins_pitch() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let e = EulerAngles::from_quaternion(h, -h, 0.0, 0.0);
        assert_eq!(e.pitch, -FRAC_PI_2);
        assert_eq!(e.roll, 0.0);
    }

    #[test]
    fn zero_quaternion_does_not_divide() {
        let e = EulerAngles::from_quaternion(0.0, 0.0, 0.0, 0.0);
        assert_eq!(e.roll, 0.0);
        assert!(e.yaw.is_finite() && e.pitch.is_finite());
    }

    #[test]
    fn pure_yaw_rotation() {
        let half = 0.25f64;
        let e = EulerAngles::from_quaternion(half.cos(), 0.0, 0.0, half.sin());
        assert!((e.yaw - 0.5).abs() < 1e-12);
        assert!(e.pitch.abs() < 1e-12);
        assert!(e.roll.abs() < 1e-12);
    }

    #[test]
    fn mvo_scales_velocity_and_uncertainty() {
        let mut p = vec![0u8; MvoFeedback::MIN_LEN];
        p[2..4].copy_from_slice(&1500i16.to_le_bytes());
        p[6..8].copy_from_slice(&(-250i16).to_le_bytes());
        put_f32(&mut p, 8, 1.5);
        put_f32(&mut p, 20, 0.5);
        put_f32(&mut p, 68, 0.75);
        p[76] = 0b0001_0001;

        let m = MvoFeedback::decode(&p).unwrap();
        assert_eq!(m.velocity, [1.5, 0.0, -0.25]);
        assert_eq!(m.position[0], 1.5);
        assert_eq!(m.position_uncertainty, 5000.0);
        assert_eq!(m.position_covariance[0], 0.5);
        assert_eq!(m.tof, 0.75);
        assert_eq!(m.validity, MvoValidity::VEL_X | MvoValidity::POS_X);
        assert!(MvoFeedback::decode(&p[..76]).is_none());
    }

    #[test]
    fn imu_attitude_decodes_quaternion() {
        let mut p = vec![0u8; ImuAttitude::MIN_LEN];
        p[0..8].copy_from_slice(&2.35f64.to_le_bytes());
        put_f32(&mut p, 16, 101.0);
        put_f32(&mut p, 48, 1.0);
        put_f32(&mut p, 84, -0.5);

        let imu = ImuAttitude::decode(&p).unwrap();
        assert_eq!(imu.longitude, 2.35);
        assert_eq!(imu.baro, 101.0);
        assert_eq!(imu.quaternion, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(imu.velocity_ned[2], -0.5);
        assert_eq!(imu.euler, EulerAngles::default());
    }

    #[test]
    fn imu_extended_reads_rtk_and_flags() {
        let mut p = vec![0u8; ImuExtended::MIN_LEN];
        put_f32(&mut p, 28, 9.0);
        p[40..48].copy_from_slice(&48.85f64.to_le_bytes());
        p[52..54].copy_from_slice(&(-2i16).to_le_bytes());

        let ext = ImuExtended::decode(&p).unwrap();
        assert_eq!(ext.distance, 9.0);
        assert_eq!(ext.rtk_latitude, 48.85);
        assert_eq!(ext.error_flags, -2);
        assert!(ImuExtended::decode(&p[..53]).is_none());
    }
}
