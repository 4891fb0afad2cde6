//! Health monitor: probes, classifies, and detects state transitions.
//!
//! The monitor is the only owner of the "last known state". The poll
//! loop (`run`) is the only caller of `check_health`, so transitions are
//! always computed against the immediately preceding cycle. Command paths
//! use `evaluate`, which probes without touching that state, and
//! `mark_restart`, which arms the grace period.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use warden_core::config::MonitoringConfig;
use warden_core::{BoxFuture, ConfigError, HealthSnapshot, HealthState, HealthSummary, epoch_secs};

use crate::classifier::HealthClassifier;
use crate::probe::{NetworkProbe, Probe, ProbeReport};

/// Callback invoked by the poll loop for every snapshot with
/// `status_changed = true`.
pub type TransitionCallback = Arc<dyn Fn(HealthSnapshot) -> BoxFuture<'static, ()> + Send + Sync>;

/// Window after an operator restart during which the service is expected
/// to be down.
#[derive(Debug, Clone, Copy)]
pub struct GracePeriod {
    armed_at: Option<Instant>,
    duration: Duration,
}

impl GracePeriod {
    pub fn new(duration: Duration) -> Self {
        Self {
            armed_at: None,
            duration,
        }
    }

    pub fn arm(&mut self, at: Instant) {
        self.armed_at = Some(at);
    }

    /// Armed while `now - armed_at < duration`.
    pub fn is_armed(&self, now: Instant) -> bool {
        self.armed_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.duration)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn armed_at(&self) -> Option<Instant> {
        self.armed_at
    }

    /// Put back an earlier arming, or disarm with `None`.
    pub fn restore(&mut self, armed_at: Option<Instant>) {
        self.armed_at = armed_at;
    }
}

/// Last two snapshots and the state the next check is compared against.
#[derive(Debug)]
struct History {
    last_status: HealthState,
    current: Option<HealthSnapshot>,
    previous: Option<HealthSnapshot>,
}

pub struct HealthMonitor {
    probe: Arc<dyn Probe>,
    classifier: HealthClassifier,
    grace: Mutex<GracePeriod>,
    history: Mutex<History>,
}

impl HealthMonitor {
    pub fn new(
        probe: Arc<dyn Probe>,
        classifier: HealthClassifier,
        grace_period: Duration,
    ) -> Self {
        Self {
            probe,
            classifier,
            grace: Mutex::new(GracePeriod::new(grace_period)),
            history: Mutex::new(History {
                last_status: HealthState::Unknown,
                current: None,
                previous: None,
            }),
        }
    }

    /// Build a monitor that probes the network as configured.
    pub fn from_config(config: &MonitoringConfig) -> Result<Self, ConfigError> {
        let classifier = HealthClassifier::new(config.tcp_ports.clone(), config.main_port)?;
        let probe = Arc::new(NetworkProbe::from_config(config));
        info!(
            host = %config.host,
            ports = ?classifier.ports(),
            main_port = classifier.main_port(),
            health_url = config.health_check_url.as_deref().unwrap_or("-"),
            "health monitor initialized"
        );
        Ok(Self::new(probe, classifier, config.grace_period()))
    }

    /// Arm the grace period. Call once a restart has been issued.
    pub fn mark_restart(&self) {
        self.mark_restart_at(Instant::now());
    }

    pub fn mark_restart_at(&self, at: Instant) {
        lock(&self.grace).arm(at);
        info!(
            grace_secs = lock(&self.grace).duration().as_secs(),
            "restart grace period armed"
        );
    }

    /// When the grace period was last armed, if ever.
    pub fn grace_armed_at(&self) -> Option<Instant> {
        lock(&self.grace).armed_at()
    }

    /// Undo a `mark_restart` whose restart never happened.
    pub fn restore_grace(&self, armed_at: Option<Instant>) {
        lock(&self.grace).restore(armed_at);
        debug!(armed = armed_at.is_some(), "restart grace period restored");
    }

    pub fn grace_active_at(&self, now: Instant) -> bool {
        lock(&self.grace).is_armed(now)
    }

    /// State recorded by the most recent `check_health` call.
    pub fn current_state(&self) -> HealthState {
        lock(&self.history).last_status
    }

    pub fn last_snapshot(&self) -> Option<HealthSnapshot> {
        lock(&self.history).current.clone()
    }

    pub fn previous_snapshot(&self) -> Option<HealthSnapshot> {
        lock(&self.history).previous.clone()
    }

    /// Probe and classify without recording anything.
    ///
    /// `previous_status` is the last recorded state; `status_changed` is
    /// always false since nothing was recorded.
    pub async fn evaluate(&self) -> HealthSnapshot {
        let report = self.probe.probe().await;
        let previous = self.current_state();
        let mut snapshot = self.build_snapshot(report, Instant::now());
        snapshot.previous_status = previous;
        snapshot
    }

    /// Run one poll cycle: probe, classify, diff against the last state,
    /// and record the result.
    pub async fn check_health(&self) -> HealthSnapshot {
        let report = self.probe.probe().await;
        self.record(report, Instant::now())
    }

    /// `check_health` with an explicit clock reading for the grace check.
    pub async fn check_health_at(&self, now: Instant) -> HealthSnapshot {
        let report = self.probe.probe().await;
        self.record(report, now)
    }

    fn record(&self, report: ProbeReport, now: Instant) -> HealthSnapshot {
        let mut snapshot = self.build_snapshot(report, now);

        let mut history = lock(&self.history);
        let first = history.current.is_none();
        let previous = history.last_status;

        snapshot.previous_status = previous;
        // The first observation replaces the `unknown` sentinel silently.
        snapshot.status_changed = !first && snapshot.overall_status != previous;

        history.last_status = snapshot.overall_status;
        let prior = history.current.replace(snapshot.clone());
        history.previous = prior;
        drop(history);

        if snapshot.status_changed {
            info!(
                from = %previous,
                to = %snapshot.overall_status,
                "health status changed"
            );
        } else {
            debug!(status = %snapshot.overall_status, "health check complete");
        }
        snapshot
    }

    fn build_snapshot(&self, report: ProbeReport, now: Instant) -> HealthSnapshot {
        let raw = self.classifier.classify(&report.ports, report.http.healthy);
        let grace_active = self.grace_active_at(now);

        // While a restart is settling, anything short of healthy means
        // the service is still coming up.
        let overall = match raw {
            HealthState::Unhealthy | HealthState::Degraded if grace_active => HealthState::Starting,
            other => other,
        };

        let summary = HealthSummary {
            available_ports: self.classifier.available_count(&report.ports),
            total_ports: self.classifier.ports().len(),
            http_accessible: report.http.healthy,
        };

        HealthSnapshot {
            timestamp: epoch_secs(),
            overall_status: overall,
            raw_status: raw,
            previous_status: HealthState::Unknown,
            status_changed: false,
            grace_active,
            ports: report.ports,
            http: report.http,
            summary,
        }
    }

    /// Poll loop. Runs one cycle immediately, then one per `interval`,
    /// until `shutdown` flips to true or its sender is dropped.
    ///
    /// Each cycle (including the callback) runs in its own task; a cycle
    /// that panics is logged and the loop carries on. Shutdown is only
    /// observed between cycles, so an in-flight cycle always completes.
    pub async fn run(
        self: Arc<Self>,
        interval: Duration,
        on_change: Option<TransitionCallback>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "health poll loop starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let monitor = Arc::clone(&self);
                    let callback = on_change.clone();
                    let cycle = tokio::spawn(async move {
                        let snapshot = monitor.check_health().await;
                        let status = snapshot.overall_status;
                        if snapshot.status_changed {
                            if let Some(cb) = callback {
                                cb(snapshot).await;
                            }
                        }
                        status
                    });

                    if let Err(e) = cycle.await {
                        error!(error = %e, "health check cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("health poll loop shutting down");
                        break;
                    }
                }
            }
        }

        info!("health poll loop stopped");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
