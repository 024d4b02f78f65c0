// src/monitor.rs
//! Tracker lifecycle: owns the stores, readers and render tick

use crate::{
    config::TrackerConfig,
    error::{Result, TrackerError},
    telemetry::{
        reader::{ReaderExit, TelemetryReader},
        store::FixStore,
    },
    tick::{RenderTick, Snapshot, TargetPosition},
};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Process-scoped tracker context.
///
/// Readers and the diagnostics task are spawned by [`TrackerMonitor::start`]
/// and all observe the same cancellation token; [`TrackerMonitor::join`]
/// waits for every one of them.
pub struct TrackerMonitor {
    config: TrackerConfig,
    receiver: Arc<FixStore>,
    target: Option<Arc<FixStore>>,
    render: Arc<RenderTick>,
    cancel: CancellationToken,
    readers: Vec<(String, JoinHandle<ReaderExit>)>,
    diagnostics: Option<JoinHandle<()>>,
}

impl TrackerMonitor {
    /// Create a monitor from a validated configuration
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        let receiver = Arc::new(FixStore::with_capacity(
            config.receiver.name.as_str(),
            config.store_capacity,
        ));

        let (target, position) = match (&config.target, config.reference) {
            (Some(source), _) => {
                let store = Arc::new(FixStore::with_capacity(
                    source.name.as_str(),
                    config.store_capacity,
                ));
                (Some(Arc::clone(&store)), TargetPosition::Beacon(store))
            }
            (None, Some(point)) => (None, TargetPosition::Fixed(point)),
            (None, None) => {
                return Err(TrackerError::Config(
                    "either a target beacon or a reference point is required".to_string(),
                ))
            }
        };

        let render = RenderTick::new(Arc::clone(&receiver), position, config.heading_convention)
            .with_pairing_window(config.max_pairing_skew());

        Ok(Self {
            config,
            receiver,
            target,
            render: Arc::new(render),
            cancel: CancellationToken::new(),
            readers: Vec::new(),
            diagnostics: None,
        })
    }

    /// Spawn one reader per configured source plus the diagnostics task.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if !self.readers.is_empty() {
            warn!("monitor already started");
            return;
        }

        let mut sources = vec![(self.config.receiver.clone(), Arc::clone(&self.receiver))];
        if let (Some(source), Some(store)) = (&self.config.target, &self.target) {
            sources.push((source.clone(), Arc::clone(store)));
        }

        for (source, store) in sources {
            let name = source.name.clone();
            let reader = TelemetryReader::new(source, store);
            let handle = tokio::spawn(reader.run(self.cancel.child_token()));
            self.readers.push((name, handle));
        }

        if let Some(interval) = self.config.diagnostics_interval() {
            self.diagnostics = Some(tokio::spawn(run_diagnostics(
                self.stores(),
                interval,
                self.cancel.child_token(),
            )));
        }

        info!(
            sources = self.readers.len(),
            convention = %self.render.convention(),
            "tracker started"
        );
    }

    /// Signal every task to stop
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Wait for all spawned tasks; returns how each reader ended
    pub async fn join(&mut self) -> Vec<(String, ReaderExit)> {
        let mut exits = Vec::with_capacity(self.readers.len());
        for (name, handle) in self.readers.drain(..) {
            match handle.await {
                Ok(exit) => exits.push((name, exit)),
                Err(e) => {
                    warn!(source = %name, "reader task failed: {}", e);
                    exits.push((name, ReaderExit::ReadFailed));
                }
            }
        }

        if let Some(handle) = self.diagnostics.take() {
            if let Err(e) = handle.await {
                warn!("diagnostics task failed: {}", e);
            }
        }

        exits
    }

    /// Stop and wait
    pub async fn shutdown(mut self) -> Vec<(String, ReaderExit)> {
        self.stop();
        self.join().await
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Token cancelled when the monitor stops
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn render_tick(&self) -> &Arc<RenderTick> {
        &self.render
    }

    pub fn receiver_store(&self) -> &Arc<FixStore> {
        &self.receiver
    }

    pub fn target_store(&self) -> Option<&Arc<FixStore>> {
        self.target.as_ref()
    }

    /// Receiver store first, then the target store if there is one
    pub fn stores(&self) -> Vec<Arc<FixStore>> {
        std::iter::once(Arc::clone(&self.receiver))
            .chain(self.target.iter().cloned())
            .collect()
    }

    /// Last snapshot published by the render tick
    pub fn latest_snapshot(&self) -> Snapshot {
        self.render.latest()
    }
}

impl Drop for TrackerMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_diagnostics(stores: Vec<Arc<FixStore>>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; nothing to report yet
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for store in &stores {
                    let status = store.status();
                    info!(
                        source = %status.name,
                        retained = status.retained,
                        appended = status.appended,
                        discarded = status.discarded,
                        latest = ?status.latest,
                        "store summary"
                    );
                    if tracing::enabled!(tracing::Level::DEBUG) {
                        debug!(source = %status.name, history = ?store.history(), "accumulated fixes");
                    }
                }
            }
        }
    }
}
