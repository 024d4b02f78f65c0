// src/telemetry/fix.rs
//! Parsed telemetry samples

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One validated position sample from a beacon.
///
/// A fix is only ever built from a fully numeric, in-range line and is never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fix {
    pub latitude: f64,          // degrees, [-90, 90]
    pub longitude: f64,         // degrees, [-180, 180]
    pub heading: Option<f64>,   // degrees, [0, 360)
    pub received_at: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, heading: Option<f64>) -> Self {
        Self::received(latitude, longitude, heading, Utc::now())
    }

    pub fn received(
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            heading,
            received_at,
        }
    }

    /// Heading in degrees, 0 when the source does not report one
    pub fn heading_or_north(&self) -> f64 {
        self.heading.unwrap_or(0.0)
    }

    /// Get the age of the fix in milliseconds
    pub fn age_ms(&self) -> i64 {
        Utc::now().signed_duration_since(self.received_at).num_milliseconds()
    }

    /// Format coordinate for display
    pub fn format_coordinate(coord: f64) -> String {
        format!("{:>12.6}°", coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_defaults_to_north() {
        let fix = Fix::new(12.0, 34.0, None);
        assert_eq!(fix.heading_or_north(), 0.0);

        let fix = Fix::new(12.0, 34.0, Some(270.0));
        assert_eq!(fix.heading_or_north(), 270.0);
    }

    #[test]
    fn test_age_is_non_negative_for_past_fix() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        let fix = Fix::received(0.0, 0.0, None, past);
        assert!(fix.age_ms() >= 5000);
    }
}
