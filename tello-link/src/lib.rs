//! # tello-link
//!
//! Command-line companion to `tello-core`: connects to the drone, logs
//! telemetry and saves photos the drone pushes back.

pub mod config;
pub mod report;
