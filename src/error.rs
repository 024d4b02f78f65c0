// src/error.rs
//! Error types for the beacon tracker

use std::fmt;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug)]
pub enum TrackerError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    /// Device unreachable or busy when opening a source
    Connection(String),
    /// A telemetry line that could not be turned into a fix
    Parse(String),
    /// A store had no fixes when a value was required
    EmptyData(String),
    Config(String),
    Other(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Io(e) => write!(f, "IO error: {}", e),
            TrackerError::Serial(e) => write!(f, "Serial error: {}", e),
            TrackerError::Json(e) => write!(f, "JSON error: {}", e),
            TrackerError::Connection(msg) => write!(f, "Connection error: {}", msg),
            TrackerError::Parse(msg) => write!(f, "Parse error: {}", msg),
            TrackerError::EmptyData(msg) => write!(f, "No data: {}", msg),
            TrackerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TrackerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackerError::Io(e) => Some(e),
            TrackerError::Serial(e) => Some(e),
            TrackerError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(error: std::io::Error) -> Self {
        TrackerError::Io(error)
    }
}

impl From<tokio_serial::Error> for TrackerError {
    fn from(error: tokio_serial::Error) -> Self {
        TrackerError::Serial(error)
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(error: serde_json::Error) -> Self {
        TrackerError::Json(error)
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(error: anyhow::Error) -> Self {
        TrackerError::Other(error.to_string())
    }
}
