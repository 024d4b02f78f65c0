// src/display/json.rs
//! Headless output: one JSON object per snapshot

use super::{PolarLayout, SnapshotDisplay};
use crate::{error::Result, telemetry::store::SourceStatus, tick::Snapshot};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct Record<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    marker_radius: Option<f64>,
    sources: &'a [SourceStatus],
}

/// Writes newline-delimited JSON to any writer
pub struct JsonLinesDisplay<W: Write> {
    out: W,
    layout: PolarLayout,
}

impl<W: Write> JsonLinesDisplay<W> {
    pub fn new(out: W, layout: PolarLayout) -> Self {
        Self { out, layout }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SnapshotDisplay for JsonLinesDisplay<W> {
    fn present(&mut self, snapshot: &Snapshot, sources: &[SourceStatus]) -> Result<()> {
        let record = Record {
            snapshot,
            marker_radius: self.layout.point(snapshot).map(|p| p.radius),
            sources,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
