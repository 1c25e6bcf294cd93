//! Rendering telemetry for the terminal.

use tello_core::TelemetrySnapshot;
use tello_core::telemetry::fly_mode;

fn mode_name(mode: u8) -> &'static str {
    match mode {
        fly_mode::HOVERING => "hovering",
        fly_mode::TAKING_OFF => "taking off",
        fly_mode::LANDING => "landing",
        _ => "other",
    }
}

/// One human-readable status line.
pub fn status_line(snapshot: &TelemetrySnapshot) -> String {
    format!(
        "height {:.1} m | battery {}% | mode {} ({}) | wifi {} | light {}",
        snapshot.height_m(),
        snapshot.battery_percentage(),
        snapshot.fly_mode(),
        mode_name(snapshot.fly_mode()),
        snapshot.wifi_strength,
        snapshot.light_strength,
    )
}

/// The whole snapshot as one line of JSON.
pub fn json_line(snapshot: &TelemetrySnapshot) -> serde_json::Result<String> {
    serde_json::to_string(snapshot)
}

// ── Tests ────────────────────────────────────────────────────────
