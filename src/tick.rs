// src/tick.rs
//! Periodic bearing/range computation from the latest fixes

use crate::{
    config::ReferencePoint,
    error::{Result, TrackerError},
    geodesy::{self, HeadingConvention},
    telemetry::{store::FixStore, Fix},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Where the target position comes from
#[derive(Debug, Clone)]
pub enum TargetPosition {
    /// Second beacon
    Beacon(Arc<FixStore>),
    /// Fixed coordinate, single-beacon deployments
    Fixed(ReferencePoint),
}

impl TargetPosition {
    fn latest(&self) -> Option<TargetFix> {
        match self {
            TargetPosition::Beacon(store) => store.latest().map(|fix| TargetFix {
                latitude: fix.latitude,
                longitude: fix.longitude,
                received_at: Some(fix.received_at),
            }),
            TargetPosition::Fixed(point) => Some(TargetFix {
                latitude: point.latitude,
                longitude: point.longitude,
                received_at: None,
            }),
        }
    }
}

struct TargetFix {
    latitude: f64,
    longitude: f64,
    received_at: Option<DateTime<Utc>>,
}

/// Bearing and range from one receiver/target pairing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub azimuth_deg: f64,
    pub distance_km: f64,
    /// Receiver heading used for the azimuth
    pub receiver_heading_deg: f64,
    /// Receipt-time difference between the paired fixes, if both are beacons
    pub skew_ms: Option<i64>,
    /// Skew exceeded the configured pairing window
    pub stale: bool,
}

/// Output of one render tick; `reading` is `None` until both sides have data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub computed_at: DateTime<Utc>,
    pub reading: Option<Reading>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            computed_at: Utc::now(),
            reading: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reading.is_none()
    }

    pub fn azimuth_deg(&self) -> Option<f64> {
        self.reading.map(|r| r.azimuth_deg)
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.reading.map(|r| r.distance_km)
    }

    /// The reading, or `EmptyData` while waiting for fixes
    pub fn require_reading(&self) -> Result<Reading> {
        self.reading
            .ok_or_else(|| TrackerError::EmptyData("no receiver/target fix pair yet".to_string()))
    }
}

/// Pairs the newest receiver fix with the newest target position.
///
/// Reactive: the presentation layer calls [`RenderTick::tick`] on its own
/// timer. The last snapshot is kept for pull-based consumers.
#[derive(Debug)]
pub struct RenderTick {
    receiver: Arc<FixStore>,
    target: TargetPosition,
    convention: HeadingConvention,
    max_skew: Option<chrono::Duration>,
    latest: RwLock<Snapshot>,
}

impl RenderTick {
    pub fn new(receiver: Arc<FixStore>, target: TargetPosition, convention: HeadingConvention) -> Self {
        Self {
            receiver,
            target,
            convention,
            max_skew: None,
            latest: RwLock::new(Snapshot::empty()),
        }
    }

    /// Flag snapshots whose fixes were received more than `window` apart
    pub fn with_pairing_window(mut self, window: Option<chrono::Duration>) -> Self {
        self.max_skew = window;
        self
    }

    pub fn convention(&self) -> HeadingConvention {
        self.convention
    }

    /// Recompute from the current fixes and publish the result
    pub fn tick(&self) -> Snapshot {
        let snapshot = self.compute(Utc::now());
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        snapshot
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Snapshot {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn compute(&self, now: DateTime<Utc>) -> Snapshot {
        let (Some(receiver), Some(target)) = (self.receiver.latest(), self.target.latest()) else {
            return Snapshot {
                computed_at: now,
                reading: None,
            };
        };

        Snapshot {
            computed_at: now,
            reading: Some(self.pair(&receiver, &target)),
        }
    }

    fn pair(&self, receiver: &Fix, target: &TargetFix) -> Reading {
        let heading = receiver.heading_or_north();
        let azimuth_deg = geodesy::bearing(
            receiver.latitude,
            receiver.longitude,
            target.latitude,
            target.longitude,
            heading,
            self.convention,
        );
        let distance_km = geodesy::distance(
            receiver.latitude,
            receiver.longitude,
            target.latitude,
            target.longitude,
        );

        let skew = target
            .received_at
            .map(|at| (receiver.received_at - at).abs());
        let stale = match (skew, self.max_skew) {
            (Some(skew), Some(window)) => skew > window,
            _ => false,
        };

        Reading {
            azimuth_deg,
            distance_km,
            receiver_heading_deg: heading,
            skew_ms: skew.map(|s| s.num_milliseconds()),
            stale,
        }
    }
}
