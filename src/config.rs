// src/config.rs
//! Tracker configuration: JSON file plus command-line overrides

use crate::{
    display::PolarLayout,
    error::{Result, TrackerError},
    geodesy::HeadingConvention,
    telemetry::{layout::FieldLayout, store::DEFAULT_CAPACITY},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// One serial-connected beacon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub port: String,
    pub baudrate: u32,
    pub layout: FieldLayout,
    /// Wait before opening the port, lets USB serial devices settle
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Retry opening the port after this delay; `None` gives up on first failure
    #[serde(default)]
    pub reconnect_delay_ms: Option<u64>,
}

fn default_startup_delay_ms() -> u64 {
    1000
}

impl SourceConfig {
    pub fn new(name: &str, port: &str, baudrate: u32, layout: FieldLayout) -> Self {
        Self {
            name: name.to_string(),
            port: port.to_string(),
            baudrate,
            layout,
            startup_delay_ms: default_startup_delay_ms(),
            reconnect_delay_ms: None,
        }
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect_delay_ms.map(Duration::from_millis)
    }

    fn default_receiver() -> Self {
        Self::new("receiver", "/dev/ttyACM0", 9600, FieldLayout::RECEIVER_A)
    }

    fn default_target() -> Self {
        Self::new("target", "/dev/ttyACM1", 9600, FieldLayout::target(7))
    }
}

/// Fixed target coordinate for single-beacon deployments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl FromStr for ReferencePoint {
    type Err = String;

    /// Parse `LAT,LON` in decimal degrees
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON but got '{}'", s))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("bad latitude '{}': {}", lat, e))?;
        let longitude = lon
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("bad longitude '{}': {}", lon, e))?;
        Ok(Self { latitude, longitude })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub receiver: SourceConfig,
    /// Second beacon; takes precedence over `reference` when both are set
    pub target: Option<SourceConfig>,
    pub reference: Option<ReferencePoint>,
    pub heading_convention: HeadingConvention,
    pub tick_interval_ms: u64,
    /// Flag snapshots whose two fixes were received further apart than this
    pub max_pairing_skew_ms: Option<u64>,
    pub store_capacity: usize,
    /// Periodic store summary in the log; `None` disables it
    pub diagnostics_interval_ms: Option<u64>,
    pub display: PolarLayout,
    /// Heading line of the terminal plot
    pub title: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            receiver: SourceConfig::default_receiver(),
            target: Some(SourceConfig::default_target()),
            reference: None,
            heading_convention: HeadingConvention::Add,
            tick_interval_ms: 2000,
            max_pairing_skew_ms: None,
            store_capacity: DEFAULT_CAPACITY,
            diagnostics_interval_ms: Some(2000),
            display: PolarLayout::default(),
            title: "Beacon Tracker".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from `path`, or defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            TrackerError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Get config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TrackerError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("beacon-tracker")
            .join("config.json"))
    }

    /// Check the configuration describes something we can run
    pub fn validate(&self) -> Result<()> {
        if self.target.is_none() && self.reference.is_none() {
            return Err(TrackerError::Config(
                "either a target beacon or a reference point is required".to_string(),
            ));
        }
        if let Some(reference) = self.reference {
            if !(-90.0..=90.0).contains(&reference.latitude)
                || !(-180.0..=180.0).contains(&reference.longitude)
            {
                return Err(TrackerError::Config(format!(
                    "reference point out of range: {},{}",
                    reference.latitude, reference.longitude
                )));
            }
        }
        for source in std::iter::once(&self.receiver).chain(self.target.iter()) {
            source.layout.check().map_err(|e| {
                TrackerError::Config(format!("{} layout: {}", source.name, e))
            })?;
        }
        if self.store_capacity == 0 {
            return Err(TrackerError::Config("store_capacity must be at least 1".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(TrackerError::Config("tick_interval_ms must be positive".to_string()));
        }
        if self.display.radial_max <= self.display.radial_min {
            return Err(TrackerError::Config(
                "display radial range must be increasing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn max_pairing_skew(&self) -> Option<chrono::Duration> {
        self.max_pairing_skew_ms
            .and_then(|ms| i64::try_from(ms).ok())
            .map(chrono::Duration::milliseconds)
    }

    pub fn diagnostics_interval(&self) -> Option<Duration> {
        self.diagnostics_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Command-line options; each one overrides the matching config field
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (defaults to ~/.config/beacon-tracker/config.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial device of the receiver beacon
    #[arg(long, value_name = "DEVICE")]
    pub receiver_port: Option<String>,

    /// Receiver line layout: a (6 fields, heading at 3) or b (7 fields, heading at 4)
    #[arg(long, value_name = "LAYOUT", value_parser = parse_layout)]
    pub receiver_layout: Option<FieldLayout>,

    /// Serial device of the target beacon
    #[arg(long, value_name = "DEVICE", conflicts_with = "reference")]
    pub target_port: Option<String>,

    /// Fixed target position instead of a second beacon
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub reference: Option<ReferencePoint>,

    /// Baud rate for every serial source
    #[arg(long, short, value_name = "BAUD")]
    pub baud: Option<u32>,

    /// Whether the receiver heading is added to or subtracted from the bearing
    #[arg(long, value_name = "add|subtract")]
    pub convention: Option<HeadingConvention>,

    /// Render interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Flag snapshots whose fixes were received more than this apart
    #[arg(long, value_name = "MS")]
    pub max_skew_ms: Option<u64>,

    /// Retry opening serial ports after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub reconnect_ms: Option<u64>,

    /// Print one JSON snapshot per tick instead of drawing the plot
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// List available serial ports and exit
    #[arg(long, default_value_t = false)]
    pub list_ports: bool,

    /// Write the effective configuration back to the config file
    #[arg(long, default_value_t = false)]
    pub save_config: bool,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

fn parse_layout(s: &str) -> std::result::Result<FieldLayout, String> {
    FieldLayout::named(s).ok_or_else(|| format!("unknown layout '{}' (expected a or b)", s))
}

impl CliArgs {
    /// Apply command-line overrides to a loaded configuration
    pub fn apply(&self, config: &mut TrackerConfig) {
        if let Some(ref port) = self.receiver_port {
            config.receiver.port = port.clone();
        }
        if let Some(layout) = self.receiver_layout {
            config.receiver.layout = layout;
        }

        if let Some(ref port) = self.target_port {
            let mut target = config
                .target
                .take()
                .unwrap_or_else(SourceConfig::default_target);
            target.port = port.clone();
            config.target = Some(target);
        }

        if let Some(reference) = self.reference {
            config.reference = Some(reference);
            config.target = None;
        }

        if let Some(baud) = self.baud {
            config.receiver.baudrate = baud;
            if let Some(ref mut target) = config.target {
                target.baudrate = baud;
            }
        }

        if let Some(ms) = self.reconnect_ms {
            config.receiver.reconnect_delay_ms = Some(ms);
            if let Some(ref mut target) = config.target {
                target.reconnect_delay_ms = Some(ms);
            }
        }

        if let Some(convention) = self.convention {
            config.heading_convention = convention;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_interval_ms = ms;
        }
        if let Some(ms) = self.max_skew_ms {
            config.max_pairing_skew_ms = Some(ms);
        }
    }
}
