//! Client configuration.
//!
//! Every section is `#[serde(default)]`, so a partial file only needs
//! the keys it changes. Loading from disk is left to the binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TelloError;
use crate::protocol::control::{BITRATE_MAX, EXPOSURE_RANGE};
use crate::video::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelloConfig {
    pub network: NetworkConfig,
    pub video: VideoConfig,
    pub flight: FlightConfig,
}

/// Control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Device address.
    pub drone_address: IpAddr,
    /// Device port commands go to.
    pub command_port: u16,
    /// Local port the device answers on (0 = any).
    pub local_port: u16,
    /// Port number carried in the handshake request.
    pub handshake_port: u16,
    /// Receive buffer size.
    pub max_datagram: usize,
    /// Heartbeat tick; a silent window this long counts as a timeout.
    pub receive_timeout_ms: u64,
}

/// Video channel and camera defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub port: u16,
    pub receive_timeout_ms: u64,
    /// Period of the keep-alive video-start request.
    pub refresh_interval_ms: u64,
    pub codec_open_attempts: u32,
    pub codec_open_timeout_ms: u64,
    /// -9..=9
    pub exposure: i8,
    /// 0 = auto, 1..=5 fixed.
    pub bitrate: u8,
    pub zoom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub takeoff_timeout_ms: u64,
    pub land_timeout_ms: u64,
    /// Metres.
    pub takeoff_altitude_limit: u16,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            drone_address: IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1)),
            command_port: 8889,
            local_port: 9000,
            handshake_port: 9617,
            max_datagram: 2048,
            receive_timeout_ms: 2000,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            port: 6038,
            receive_timeout_ms: 4000,
            refresh_interval_ms: 2000,
            codec_open_attempts: 5,
            codec_open_timeout_ms: 5000,
            exposure: 0,
            bitrate: 4,
            zoom: false,
        }
    }
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            takeoff_timeout_ms: 8000,
            land_timeout_ms: 5000,
            takeoff_altitude_limit: 30,
        }
    }
}

// ── Accessors ────────────────────────────────────────────────────

impl NetworkConfig {
    pub fn drone(&self) -> SocketAddr {
        SocketAddr::new(self.drone_address, self.command_port)
    }

    pub fn local(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.local_port)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl VideoConfig {
    pub fn local(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.codec_open_attempts,
            per_attempt: Duration::from_millis(self.codec_open_timeout_ms),
        }
    }
}

impl FlightConfig {
    pub fn takeoff_timeout(&self) -> Duration {
        Duration::from_millis(self.takeoff_timeout_ms)
    }

    pub fn land_timeout(&self) -> Duration {
        Duration::from_millis(self.land_timeout_ms)
    }
}

impl TelloConfig {
    /// Reject values the device would misread.
    pub fn validate(&self) -> Result<(), TelloError> {
        if !EXPOSURE_RANGE.contains(&self.video.exposure) {
            return Err(TelloError::InvalidArgument(format!(
                "video.exposure {} outside {EXPOSURE_RANGE:?}",
                self.video.exposure
            )));
        }
        if self.video.bitrate > BITRATE_MAX {
            return Err(TelloError::InvalidArgument(format!(
                "video.bitrate {} outside 0..={BITRATE_MAX}",
                self.video.bitrate
            )));
        }
        if self.video.codec_open_attempts == 0 {
            return Err(TelloError::InvalidArgument(
                "video.codec_open_attempts must be at least 1".into(),
            ));
        }
        let durations = [
            ("network.receive_timeout_ms", self.network.receive_timeout_ms),
            ("video.receive_timeout_ms", self.video.receive_timeout_ms),
            ("video.refresh_interval_ms", self.video.refresh_interval_ms),
            ("video.codec_open_timeout_ms", self.video.codec_open_timeout_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, ms)| *ms == 0) {
            return Err(TelloError::InvalidArgument(format!("{name} must be above zero")));
        }
        if self.network.max_datagram < crate::header::MIN_FRAME_SIZE {
            return Err(TelloError::InvalidArgument(format!(
                "network.max_datagram {} too small",
                self.network.max_datagram
            )));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_conventions() {
        let cfg = TelloConfig::default();
        assert_eq!(cfg.network.drone().to_string(), "192.168.10.1:8889");
        assert_eq!(cfg.network.local().port(), 9000);
        assert_eq!(cfg.video.port, 6038);
        assert_eq!(cfg.video.retry_policy().attempts, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_camera_settings() {
        let mut cfg = TelloConfig::default();
        cfg.video.exposure = 12;
        assert!(cfg.validate().is_err());

        let mut cfg = TelloConfig::default();
        cfg.video.bitrate = 9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_durations() {
        let zeroed: [fn(&mut TelloConfig); 4] = [
            |c| c.network.receive_timeout_ms = 0,
            |c| c.video.receive_timeout_ms = 0,
            |c| c.video.refresh_interval_ms = 0,
            |c| c.video.codec_open_timeout_ms = 0,
        ];
        for zero in zeroed {
            let mut cfg = TelloConfig::default();
            zero(&mut cfg);
            let err = cfg.validate().unwrap_err();
            assert!(matches!(err, TelloError::InvalidArgument(ref m) if m.contains("above zero")));
        }
    }
}
