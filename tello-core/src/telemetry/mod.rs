//! Telemetry decoding: the flight-status message, the log-record
//! stream, and the snapshot both feed.

pub mod flight;
pub mod log;
pub mod records;
pub mod sensors;
pub mod snapshot;

pub use flight::{FLIGHT_MSG_LEN, FlightData, fly_mode};
pub use log::LogDecoder;
pub use records::{EulerAngles, ImuAttitude, ImuExtended, MvoFeedback};
pub use sensors::{SENSORS, Sensor, read_sensor, sensor_index};
pub use snapshot::TelemetrySnapshot;
