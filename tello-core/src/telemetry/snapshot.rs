//! The decoded device state.
//!
//! A snapshot is a plain value. The receive loop mutates its own copy
//! and publishes it whole (`Arc` swap through a `watch` channel), so a
//! reader always sees one consistent record.

use serde::Serialize;

use crate::telemetry::flight::FlightData;
use crate::telemetry::records::{ImuAttitude, ImuExtended, MvoFeedback};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub flight: FlightData,
    pub wifi_strength: u8,
    pub wifi_disturb: u8,
    pub light_strength: u8,
    pub mvo: MvoFeedback,
    pub imu: ImuAttitude,
    pub imu_ext: ImuExtended,
    /// Log records walked since connect.
    pub log_records: u64,
}

impl TelemetrySnapshot {
    pub fn battery_percentage(&self) -> u8 {
        self.flight.battery_percentage
    }

    pub fn fly_mode(&self) -> u8 {
        self.flight.fly_mode
    }

    /// Height above the take-off point in metres.
    pub fn height_m(&self) -> f64 {
        self.flight.height as f64 / 10.0
    }
}
