// src/display/mod.rs
//! Presentation of the polar bearing/range plot

pub mod json;
pub mod terminal;

use crate::{
    error::Result,
    telemetry::store::{FixStore, SourceStatus},
    tick::{RenderTick, Snapshot},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One marker on the polar plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarPoint {
    pub radius: f64,
    pub angle_deg: f64,
}

/// Polar axis configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarLayout {
    /// Radius the target marker is drawn at
    pub marker_radius: f64,
    /// Screen angle (counter-clockwise from east) where azimuth 0 sits
    pub rotation_deg: f64,
    pub clockwise: bool,
    pub radial_min: f64,
    pub radial_max: f64,
}

impl Default for PolarLayout {
    fn default() -> Self {
        Self {
            marker_radius: 20.0,
            rotation_deg: 90.0,
            clockwise: true,
            radial_min: 0.0,
            radial_max: 45.0,
        }
    }
}

impl PolarLayout {
    /// Marker for a snapshot, `None` when it carries no reading
    pub fn point(&self, snapshot: &Snapshot) -> Option<PolarPoint> {
        snapshot.azimuth_deg().map(|angle_deg| PolarPoint {
            radius: self.marker_radius,
            angle_deg,
        })
    }

    /// Map a polar point onto the unit disc, x to the right and y up
    pub fn project(&self, point: PolarPoint) -> (f64, f64) {
        let span = self.radial_max - self.radial_min;
        let r = if span > 0.0 {
            ((point.radius - self.radial_min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let turn = if self.clockwise { -point.angle_deg } else { point.angle_deg };
        let screen = (self.rotation_deg + turn).to_radians();

        (r * screen.cos(), r * screen.sin())
    }
}

/// Something that draws snapshots
pub trait SnapshotDisplay {
    /// Called once before the first snapshot
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn present(&mut self, snapshot: &Snapshot, sources: &[SourceStatus]) -> Result<()>;

    /// Called once after the last snapshot
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drive the render tick on `interval` and hand each snapshot to `display`
/// until `cancel` fires.
pub async fn run_display<D: SnapshotDisplay>(
    display: &mut D,
    tick: &RenderTick,
    stores: &[Arc<FixStore>],
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    display.begin()?;

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            _ = ticker.tick() => {
                let snapshot = tick.tick();
                debug!(
                    azimuth = ?snapshot.azimuth_deg(),
                    distance_km = ?snapshot.distance_km(),
                    "render tick"
                );
                let sources: Vec<SourceStatus> = stores.iter().map(|s| s.status()).collect();
                if let Err(e) = display.present(&snapshot, &sources) {
                    break Err(e);
                }
            }
        }
    };

    display.finish()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_default_layout() {
        let layout = PolarLayout::default();
        assert_eq!(layout.marker_radius, 20.0);
        assert_eq!(layout.rotation_deg, 90.0);
        assert!(layout.clockwise);
        assert_eq!((layout.radial_min, layout.radial_max), (0.0, 45.0));
    }

    #[test]
    fn test_projection_compass_orientation() {
        let layout = PolarLayout {
            marker_radius: 45.0,
            ..PolarLayout::default()
        };
        let at = |angle_deg| layout.project(PolarPoint { radius: 45.0, angle_deg });

        assert!(close(at(0.0), (0.0, 1.0)));   // north is up
        assert!(close(at(90.0), (1.0, 0.0)));  // east is right
        assert!(close(at(180.0), (0.0, -1.0)));
        assert!(close(at(270.0), (-1.0, 0.0)));
    }

    #[test]
    fn test_projection_counter_clockwise() {
        let layout = PolarLayout {
            clockwise: false,
            rotation_deg: 0.0,
            ..PolarLayout::default()
        };
        let (x, y) = layout.project(PolarPoint { radius: 45.0, angle_deg: 90.0 });
        assert!(close((x, y), (0.0, 1.0)));
    }

    #[test]
    fn test_projection_clamps_radius() {
        let layout = PolarLayout::default();
        let (x, y) = layout.project(PolarPoint { radius: 90.0, angle_deg: 0.0 });
        assert!(close((x, y), (0.0, 1.0)));

        let (x, y) = layout.project(PolarPoint { radius: 20.0, angle_deg: 0.0 });
        assert!(close((x, y), (0.0, 20.0 / 45.0)));
    }

    #[test]
    fn test_point_for_empty_snapshot() {
        let layout = PolarLayout::default();
        assert!(layout.point(&Snapshot::empty()).is_none());
    }
}
