// src/telemetry/layout.rs
//! Comma-separated beacon line parsing

use super::fix::Fix;
use crate::{error::TrackerError, geodesy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest field count a layout may ask for
pub const MAX_FIELDS: usize = 64;

/// Where the interesting fields sit in one beacon's comma-separated line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    /// Lines with fewer fields than this are discarded
    pub min_fields: usize,
    pub latitude: usize,
    pub longitude: usize,
    /// `None` for beacons that do not report a heading
    #[serde(default)]
    pub heading: Option<usize>,
}

impl FieldLayout {
    /// Receiver firmware with the 6-field sentence, heading in field 3
    pub const RECEIVER_A: FieldLayout = FieldLayout {
        min_fields: 6,
        latitude: 0,
        longitude: 1,
        heading: Some(3),
    };

    /// Receiver firmware with the 7-field sentence, heading in field 4
    pub const RECEIVER_B: FieldLayout = FieldLayout {
        min_fields: 7,
        latitude: 0,
        longitude: 1,
        heading: Some(4),
    };

    /// Target beacon: position only
    pub const fn target(min_fields: usize) -> Self {
        FieldLayout {
            min_fields,
            latitude: 0,
            longitude: 1,
            heading: None,
        }
    }

    /// Look up a named layout: `a`, `b`, `target6` or `target7`
    pub fn named(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "a" | "receiver-a" => Some(Self::RECEIVER_A),
            "b" | "receiver-b" => Some(Self::RECEIVER_B),
            "target6" | "target" => Some(Self::target(6)),
            "target7" => Some(Self::target(7)),
            _ => None,
        }
    }

    fn highest_index(&self) -> usize {
        self.latitude
            .max(self.longitude)
            .max(self.heading.unwrap_or(0))
    }

    /// Smallest field count that still covers every configured index
    fn required_fields(&self) -> usize {
        self.min_fields.max(self.highest_index().saturating_add(1))
    }

    /// Reject layouts no beacon line could satisfy
    pub fn check(&self) -> Result<(), String> {
        if self.min_fields == 0 {
            return Err("min_fields must be at least 1".to_string());
        }
        if self.min_fields > MAX_FIELDS || self.highest_index() >= MAX_FIELDS {
            return Err(format!("field indices must be below {}", MAX_FIELDS));
        }
        Ok(())
    }
}

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum LineError {
    TooFewFields { found: usize, required: usize },
    NotNumeric { index: usize, value: String },
    OutOfRange { field: &'static str, value: f64 },
    NotUtf8,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::TooFewFields { found, required } => {
                write!(f, "{} fields, need at least {}", found, required)
            }
            LineError::NotNumeric { index, value } => {
                write!(f, "field {} is not numeric: {:?}", index, value)
            }
            LineError::OutOfRange { field, value } => write!(f, "{} out of range: {}", field, value),
            LineError::NotUtf8 => write!(f, "line is not valid UTF-8"),
        }
    }
}

impl std::error::Error for LineError {}

impl From<LineError> for TrackerError {
    fn from(error: LineError) -> Self {
        TrackerError::Parse(error.to_string())
    }
}

/// Parse one telemetry line into a fix stamped with the current time
pub fn parse_line(line: &str, layout: &FieldLayout) -> Result<Fix, LineError> {
    parse_line_at(line, layout, Utc::now())
}

/// Parse one telemetry line into a fix stamped with `received_at`
pub fn parse_line_at(
    line: &str,
    layout: &FieldLayout,
    received_at: DateTime<Utc>,
) -> Result<Fix, LineError> {
    let parts: Vec<&str> = line.trim().split(',').collect();

    let required = layout.required_fields();
    if parts.len() < required {
        return Err(LineError::TooFewFields {
            found: parts.len(),
            required,
        });
    }

    let latitude = parse_field(&parts, layout.latitude)?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(LineError::OutOfRange {
            field: "latitude",
            value: latitude,
        });
    }

    let longitude = parse_field(&parts, layout.longitude)?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(LineError::OutOfRange {
            field: "longitude",
            value: longitude,
        });
    }

    let heading = match layout.heading {
        Some(index) => Some(geodesy::normalize_degrees(parse_field(&parts, index)?)),
        None => None,
    };

    Ok(Fix::received(latitude, longitude, heading, received_at))
}

fn parse_field(parts: &[&str], index: usize) -> Result<f64, LineError> {
    let raw = parts
        .get(index)
        .ok_or(LineError::TooFewFields {
            found: parts.len(),
            required: index.saturating_add(1),
        })?
        .trim();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(LineError::NotNumeric {
            index,
            value: raw.to_string(),
        }),
    }
}
