// src/lib.rs
//! Beacon Tracker Library
//!
//! Reads position and heading telemetry from serial GPS beacons and computes
//! the bearing and great-circle range from a receiver to a target.

pub mod config;
pub mod display;
pub mod error;
pub mod geodesy;
pub mod monitor;
pub mod telemetry;
pub mod tick;

// Re-export main types for convenience
pub use config::{CliArgs, TrackerConfig};
pub use error::{Result, TrackerError};
pub use geodesy::HeadingConvention;
pub use monitor::TrackerMonitor;
pub use telemetry::{Fix, FixStore, TelemetryReader};
pub use tick::{RenderTick, Snapshot};
