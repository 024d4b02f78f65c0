// src/main.rs
//! Beacon Tracker - bearing and range to a serial GPS beacon

use anyhow::Context;
use beacon_tracker::{
    display::{json::JsonLinesDisplay, run_display, terminal::TerminalDisplay},
    telemetry::reader::list_serial_ports,
    CliArgs, TrackerConfig, TrackerMonitor,
};
use clap::Parser;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.verbose);

    if args.list_ports {
        list_serial_ports()?;
        return Ok(());
    }

    // Load configuration
    let mut config = match args.config {
        Some(ref path) => TrackerConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TrackerConfig::load().unwrap_or_else(|e| {
            warn!("{}, using defaults", e);
            TrackerConfig::default()
        }),
    };
    args.apply(&mut config);

    if args.save_config {
        match args.config {
            Some(ref path) => config.save_to(path)?,
            None => config.save()?,
        }
        info!("configuration saved");
    }

    let mut monitor = TrackerMonitor::new(config).context("invalid configuration")?;
    monitor.start();

    let interval = monitor.config().tick_interval();
    let layout = monitor.config().display;

    let cancel = monitor.cancel_token();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            cancel.cancel();
        }
    });

    let tick = std::sync::Arc::clone(monitor.render_tick());
    let stores = monitor.stores();

    let shown = if args.headless {
        let mut display = JsonLinesDisplay::new(std::io::stdout(), layout);
        run_display(&mut display, &tick, &stores, interval, cancel).await
    } else {
        let mut display = TerminalDisplay::new(layout).with_title(&monitor.config().title);
        run_display(&mut display, &tick, &stores, interval, cancel).await
    };

    for (source, exit) in monitor.shutdown().await {
        info!(source = %source, ?exit, "reader finished");
    }

    shown?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
