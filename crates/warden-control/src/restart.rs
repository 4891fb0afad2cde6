//! Operator restart flow.
//!
//! ```text
//! request(actor)
//!   ├── governor.admit()   → RateLimited
//!   ├── governor.record()
//!   ├── monitor.mark_restart()
//!   ├── driver.restart()   → Failed (grace restored)
//!   ├── monitor.mark_restart()
//!   └── settle, evaluate() → Restarted { status }
//! ```
//!
//! The grace period is armed before the driver is called: the poll loop
//! keeps running while the container restarts, and a cycle landing in
//! that window must see `starting`, not an outage. It is armed again once
//! the driver confirms so the window counts from the confirmed restart.
//!
//! The follow-up check uses `evaluate`, so the poll loop remains the only
//! writer of the monitor's last known state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use warden_core::{ContainerDriver, HealthSnapshot, HealthState};
use warden_health::HealthMonitor;

use crate::governor::RestartGovernor;

/// Result of one restart request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestartOutcome {
    /// The actor has used up their restarts for the current window.
    RateLimited { limit: u32 },
    /// The driver did not confirm the restart.
    Failed { reason: String },
    /// Restart confirmed; health as evaluated after the settle delay.
    Restarted {
        status: HealthState,
        snapshot: Box<HealthSnapshot>,
    },
}

impl RestartOutcome {
    pub fn admitted(&self) -> bool {
        !matches!(self, RestartOutcome::RateLimited { .. })
    }
}

pub struct RestartCoordinator {
    governor: Arc<RestartGovernor>,
    monitor: Arc<HealthMonitor>,
    driver: Arc<dyn ContainerDriver>,
    settle_delay: Duration,
}

impl RestartCoordinator {
    pub fn new(
        governor: Arc<RestartGovernor>,
        monitor: Arc<HealthMonitor>,
        driver: Arc<dyn ContainerDriver>,
    ) -> Self {
        Self {
            governor,
            monitor,
            driver,
            settle_delay: Duration::from_secs(5),
        }
    }

    /// Delay between a confirmed restart and the follow-up health check.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn governor(&self) -> &Arc<RestartGovernor> {
        &self.governor
    }

    pub async fn request(&self, actor: &str) -> RestartOutcome {
        let now = Instant::now();
        if !self.governor.admit(actor, now) {
            warn!(%actor, limit = self.governor.limit(), "restart rejected: hourly limit reached");
            return RestartOutcome::RateLimited {
                limit: self.governor.limit(),
            };
        }
        self.governor.record(actor, now);

        let prior_grace = self.monitor.grace_armed_at();
        self.monitor.mark_restart();

        info!(%actor, "restarting container");
        if let Err(e) = self.driver.restart().await {
            error!(%actor, error = %e, "container restart failed");
            self.monitor.restore_grace(prior_grace);
            return RestartOutcome::Failed {
                reason: e.to_string(),
            };
        }
        self.monitor.mark_restart();

        tokio::time::sleep(self.settle_delay).await;
        let snapshot = self.monitor.evaluate().await;
        info!(%actor, status = %snapshot.overall_status, "container restarted");

        RestartOutcome::Restarted {
            status: snapshot.overall_status,
            snapshot: Box::new(snapshot),
        }
    }
}
