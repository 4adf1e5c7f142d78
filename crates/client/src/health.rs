//! Background connection health monitoring.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::api::CatalogApi;

/// Outcome of the latest probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeState {
    /// A probe is in flight.
    Checking,
    Connected { latency_ms: u64, item_count: usize },
    Failed { message: String },
}

impl ProbeState {
    /// Short status line for display.
    pub fn label(&self) -> String {
        match self {
            ProbeState::Checking => "checking...".to_string(),
            ProbeState::Connected {
                latency_ms,
                item_count,
            } => format!("connected ({latency_ms} ms, {item_count} items)"),
            ProbeState::Failed { message } => format!("unreachable: {message}"),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ProbeState::Connected { .. })
    }
}

/// Published health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProbe {
    pub state: ProbeState,
    /// Probe cycle that produced this state; 0 before the first probe.
    pub cycle: u64,
    pub at: DateTime<Utc>,
}

impl ConnectionProbe {
    fn initial() -> Self {
        Self {
            state: ProbeState::Checking,
            cycle: 0,
            at: Utc::now(),
        }
    }
}

/// Periodically probes the listing endpoint and publishes the result.
pub struct HealthMonitor {
    api: CatalogApi,
    interval: Duration,
}

impl HealthMonitor {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

    pub fn new(api: CatalogApi, interval: Duration) -> Self {
        Self { api, interval }
    }

    /// One timed probe: fetch the listing and count its entries.
    pub async fn probe(&self) -> ProbeState {
        probe_once(&self.api).await
    }

    /// Start probing: once immediately, then every interval until the
    /// returned handle is shut down or dropped.
    pub fn activate(self) -> MonitorHandle {
        let (tx, rx) = watch::channel(ConnectionProbe::initial());
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();
        let api = self.api;
        let period = self.interval;

        let task = tokio::spawn(async move {
            tracing::info!(interval_secs = period.as_secs(), "health monitor started");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut cycle = 0u64;

            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticker.tick() => {}
                }

                cycle += 1;
                tx.send_replace(ConnectionProbe {
                    state: ProbeState::Checking,
                    cycle,
                    at: Utc::now(),
                });

                let state = tokio::select! {
                    _ = stop.notified() => break,
                    state = probe_once(&api) => state,
                };

                match &state {
                    ProbeState::Connected { latency_ms, item_count } => {
                        tracing::debug!(cycle, latency_ms, item_count, "health probe succeeded")
                    }
                    ProbeState::Failed { message } => {
                        tracing::warn!(cycle, error = %message, "health probe failed")
                    }
                    ProbeState::Checking => {}
                }

                tx.send_replace(ConnectionProbe {
                    state,
                    cycle,
                    at: Utc::now(),
                });
            }

            tracing::info!("health monitor stopped");
        });

        MonitorHandle {
            state: rx,
            shutdown,
            task: Some(task),
        }
    }
}

async fn probe_once(api: &CatalogApi) -> ProbeState {
    let started = Instant::now();
    match api.count_products().await {
        Ok(item_count) => ProbeState::Connected {
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            item_count,
        },
        Err(err) => ProbeState::Failed {
            message: err.to_string(),
        },
    }
}

/// Handle to an active monitor. Dropping it stops the monitor.
pub struct MonitorHandle {
    state: watch::Receiver<ConnectionProbe>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn current(&self) -> ConnectionProbe {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionProbe> {
        self.state.clone()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop probing and wait for the task to exit. No state is published
    /// after this returns.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "health monitor task ended abnormally");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
