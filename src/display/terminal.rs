// src/display/terminal.rs
//! Terminal polar plot

use super::{PolarLayout, PolarPoint, SnapshotDisplay};
use crate::{
    error::Result,
    telemetry::{store::SourceStatus, Fix},
    tick::Snapshot,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::io::{self, Write};

/// Plot area in character cells; cells are roughly twice as tall as wide
const PLOT_WIDTH: usize = 49;
const PLOT_HEIGHT: usize = 25;

pub struct TerminalDisplay<W: Write = io::Stdout> {
    out: W,
    layout: PolarLayout,
    title: String,
}

impl TerminalDisplay {
    pub fn new(layout: PolarLayout) -> Self {
        Self::with_writer(io::stdout(), layout)
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn with_writer(out: W, layout: PolarLayout) -> Self {
        Self {
            out,
            layout,
            title: "Beacon Tracker".to_string(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    fn render_header(&mut self, snapshot: &Snapshot) -> Result<()> {
        execute!(
            self.out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(PLOT_WIDTH)),
            Print("\n"),
            Print(format!("{}\n", self.title)),
            Print("=".repeat(PLOT_WIDTH)),
            Print("\n"),
            ResetColor,
            Print(format!(
                "Computed: {}\n\n",
                snapshot.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
            ))
        )?;
        Ok(())
    }

    fn render_plot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let rows = plot_rows(&self.layout, snapshot, PLOT_WIDTH, PLOT_HEIGHT);
        for row in rows {
            if let Some((before, after)) = row.split_once('●') {
                execute!(
                    self.out,
                    Print(before),
                    SetForegroundColor(Color::Red),
                    Print('●'),
                    ResetColor,
                    Print(after),
                    Print("\n")
                )?;
            } else {
                execute!(self.out, Print(&row), Print("\n"))?;
            }
        }
        execute!(self.out, Print("\n"))?;
        Ok(())
    }

    fn render_reading(&mut self, snapshot: &Snapshot) -> Result<()> {
        execute!(
            self.out,
            SetForegroundColor(Color::Yellow),
            Print("TARGET:\n"),
            ResetColor
        )?;

        match snapshot.require_reading() {
            Ok(reading) => {
                execute!(
                    self.out,
                    Print(format!("  Azimuth:   {:>12.2}°\n", reading.azimuth_deg)),
                    Print(format!("  Distance:  {:>12.3} km\n", reading.distance_km)),
                    Print(format!("  Heading:   {:>12.1}°\n", reading.receiver_heading_deg))
                )?;
                if let Some(skew) = reading.skew_ms {
                    execute!(self.out, Print(format!("  Skew:      {:>12} ms\n", skew)))?;
                }
                if reading.stale {
                    execute!(
                        self.out,
                        SetForegroundColor(Color::Red),
                        Print("  STALE: fixes too far apart in time\n"),
                        ResetColor
                    )?;
                }
            }
            Err(_) => {
                execute!(self.out, Print("  Waiting for receiver and target fixes\n"))?;
            }
        }

        execute!(self.out, Print("\n"))?;
        Ok(())
    }

    fn render_sources(&mut self, sources: &[SourceStatus]) -> Result<()> {
        execute!(
            self.out,
            SetForegroundColor(Color::Cyan),
            Print("SOURCES:\n"),
            ResetColor
        )?;

        for source in sources {
            let position = match source.latest {
                Some(fix) => format!(
                    "{} {}  age {:>6.1}s",
                    Fix::format_coordinate(fix.latitude),
                    Fix::format_coordinate(fix.longitude),
                    fix.age_ms() as f64 / 1000.0
                ),
                None => "No fix".to_string(),
            };
            execute!(
                self.out,
                Print(format!(
                    "  {:<10} {}  fixes {:>6}  discarded {:>4}\n",
                    source.name, position, source.appended, source.discarded
                ))
            )?;
        }

        Ok(())
    }
}

impl<W: Write> SnapshotDisplay for TerminalDisplay<W> {
    fn begin(&mut self) -> Result<()> {
        execute!(self.out, Hide, DisableLineWrap)?;
        Ok(())
    }

    fn present(&mut self, snapshot: &Snapshot, sources: &[SourceStatus]) -> Result<()> {
        execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;

        self.render_header(snapshot)?;
        self.render_plot(snapshot)?;
        self.render_reading(snapshot)?;
        self.render_sources(sources)?;

        execute!(
            self.out,
            SetForegroundColor(Color::Green),
            Print("Press Ctrl+C to exit\n"),
            ResetColor
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        execute!(self.out, Show, EnableLineWrap, Print("\nShutting down...\n"))?;
        Ok(())
    }
}

/// Lay out the polar grid as text rows: range rings, cardinal labels and the
/// target marker.
pub fn plot_rows(layout: &PolarLayout, snapshot: &Snapshot, width: usize, height: usize) -> Vec<String> {
    let mut grid = vec![vec![' '; width]; height];
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    // Leave one cell around the outer ring for labels
    let rx = cx - 2.0;
    let ry = cy - 1.0;

    let put = |grid: &mut Vec<Vec<char>>, (x, y): (f64, f64), ch: char| {
        let col = (cx + x * rx).round();
        let row = (cy - y * ry).round();
        if col >= 0.0 && row >= 0.0 && (col as usize) < width && (row as usize) < height {
            grid[row as usize][col as usize] = ch;
        }
    };

    for ring in [0.5, 1.0] {
        for step in 0..180 {
            let a = (step as f64 * 2.0).to_radians();
            put(&mut grid, (ring * a.cos(), ring * a.sin()), '·');
        }
    }
    put(&mut grid, (0.0, 0.0), '+');

    for (angle_deg, label) in [(0.0, 'N'), (90.0, 'E'), (180.0, 'S'), (270.0, 'W')] {
        let (x, y) = layout.project(PolarPoint {
            radius: layout.radial_max,
            angle_deg,
        });
        put(&mut grid, (x * 1.08, y * 1.08), label);
    }

    if let Some(point) = layout.point(snapshot) {
        put(&mut grid, layout.project(point), '●');
    }

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
        .collect()
}
