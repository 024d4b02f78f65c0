// src/telemetry/mod.rs
//! Beacon telemetry ingestion

pub mod fix;
pub mod layout;
pub mod reader;
pub mod store;

pub use fix::Fix;
pub use layout::FieldLayout;
pub use reader::TelemetryReader;
pub use store::FixStore;
