// src/geodesy.rs
//! Spherical-earth bearing and distance calculations
//!
//! All angles at the API boundary are in degrees; distances are kilometres on
//! a sphere of mean radius 6371 km.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius used by the haversine formula, in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// How the receiver's own heading is folded into the target bearing.
///
/// Deployed receivers disagree here: some add their heading to the
/// geographic bearing, others subtract it. Neither is assumed correct, so the
/// choice is part of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingConvention {
    /// `bearing + heading`
    #[default]
    Add,
    /// `bearing - heading`
    Subtract,
}

impl HeadingConvention {
    fn apply(self, bearing_deg: f64, heading_deg: f64) -> f64 {
        match self {
            HeadingConvention::Add => bearing_deg + heading_deg,
            HeadingConvention::Subtract => bearing_deg - heading_deg,
        }
    }
}

impl fmt::Display for HeadingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingConvention::Add => write!(f, "add"),
            HeadingConvention::Subtract => write!(f, "subtract"),
        }
    }
}

impl std::str::FromStr for HeadingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" | "+" => Ok(HeadingConvention::Add),
            "subtract" | "sub" | "-" => Ok(HeadingConvention::Subtract),
            other => Err(format!("unknown heading convention '{}' (expected add or subtract)", other)),
        }
    }
}

/// Wrap an angle in degrees into `[0, 360)`.
///
/// Tiny negative inputs can round up to exactly 360 after `rem_euclid`; those
/// map to 0. Negative zero maps to positive zero.
pub fn normalize_degrees(angle_deg: f64) -> f64 {
    let wrapped = angle_deg.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped + 0.0
    }
}

/// Initial great-circle bearing from point 1 to point 2 in `[0, 360)`.
///
/// Identical points give 0 (`atan2(0, 0)`).
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    normalize_degrees(raw_bearing(lat1, lon1, lat2, lon2))
}

/// Bearing from the receiver at point 1 to the target at point 2, expressed
/// relative to the receiver's heading and normalized into `[0, 360)`.
///
/// # Arguments
/// * `lat1`, `lon1` - Receiver position in degrees
/// * `lat2`, `lon2` - Target position in degrees
/// * `receiver_heading_deg` - Receiver orientation in degrees
/// * `convention` - Whether the heading is added or subtracted
pub fn bearing(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
    receiver_heading_deg: f64,
    convention: HeadingConvention,
) -> f64 {
    let azimuth = raw_bearing(lat1, lon1, lat2, lon2);
    normalize_degrees(convention.apply(azimuth, receiver_heading_deg))
}

/// Great-circle distance between two points in kilometres (haversine).
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Unnormalized bearing in degrees, in `(-180, 180]`
fn raw_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    y.atan2(x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTS: [(f64, f64); 6] = [
        (0.0, 0.0),
        (48.117, 11.517),
        (-33.8688, 151.2093),
        (90.0, 0.0),
        (-90.0, 45.0),
        (51.5, -0.1),
    ];

    #[test]
    fn test_distance_to_self_is_zero() {
        for &(lat, lon) in &POINTS {
            assert_eq!(distance(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        for &(lat1, lon1) in &POINTS {
            for &(lat2, lon2) in &POINTS {
                let there = distance(lat1, lon1, lat2, lon2);
                let back = distance(lat2, lon2, lat1, lon1);
                assert!((there - back).abs() < 1e-9, "{} vs {}", there, back);
            }
        }
    }

    #[test]
    fn test_quarter_equator() {
        let d = distance(0.0, 0.0, 0.0, 90.0);
        assert!((d - 10007.5).abs() < 1.0, "got {}", d);

        let b = bearing(0.0, 0.0, 0.0, 90.0, 0.0, HeadingConvention::Add);
        assert!((b - 90.0).abs() < 1e-9, "got {}", b);
    }

    #[test]
    fn test_antipodal_distance_is_half_circumference() {
        let d = distance(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_identical_points_bearing_zero() {
        for &(lat, lon) in &POINTS {
            assert_eq!(bearing(lat, lon, lat, lon, 0.0, HeadingConvention::Add), 0.0);
            assert_eq!(initial_bearing(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_cardinal_bearings() {
        assert!((initial_bearing(0.0, 0.0, 10.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((initial_bearing(0.0, 0.0, -10.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((initial_bearing(0.0, 0.0, 0.0, -10.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_heading_conventions() {
        let add = bearing(0.0, 0.0, 0.0, 90.0, 30.0, HeadingConvention::Add);
        assert!((add - 120.0).abs() < 1e-9);

        let sub = bearing(0.0, 0.0, 0.0, 90.0, 30.0, HeadingConvention::Subtract);
        assert!((sub - 60.0).abs() < 1e-9);

        // Wraps past 360 when adding
        let wrapped = bearing(0.0, 0.0, 0.0, 90.0, 300.0, HeadingConvention::Add);
        assert!((wrapped - 30.0).abs() < 1e-9);

        // Wraps below 0 when subtracting
        let wrapped = bearing(0.0, 0.0, 0.0, 90.0, 120.0, HeadingConvention::Subtract);
        assert!((wrapped - 330.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_boundaries() {
        let near = normalize_degrees(-0.0001);
        assert!(near >= 0.0 && near < 360.0);
        assert!((near - 359.9999).abs() < 1e-9);

        assert_eq!(normalize_degrees(-1e-20), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(720.5), 0.5);
        let zero = normalize_degrees(-0.0);
        assert!(zero == 0.0 && zero.is_sign_positive());
    }

    #[test]
    fn test_bearing_always_in_range() {
        for &(lat1, lon1) in &POINTS {
            for &(lat2, lon2) in &POINTS {
                for heading in [0.0, 45.0, 179.9, 359.99] {
                    for convention in [HeadingConvention::Add, HeadingConvention::Subtract] {
                        let b = bearing(lat1, lon1, lat2, lon2, heading, convention);
                        assert!((0.0..360.0).contains(&b), "{} out of range", b);
                    }
                }
            }
        }
    }

    #[test]
    fn test_convention_from_str() {
        assert_eq!("add".parse::<HeadingConvention>(), Ok(HeadingConvention::Add));
        assert_eq!("Subtract".parse::<HeadingConvention>(), Ok(HeadingConvention::Subtract));
        assert!("sideways".parse::<HeadingConvention>().is_err());
    }
}
