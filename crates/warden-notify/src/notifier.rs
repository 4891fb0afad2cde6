//! Transition policy and recipient fan-out.

use std::sync::Arc;

use tracing::{debug, error, info};

use warden_core::config::NotificationsConfig;
use warden_core::{HealthSnapshot, HealthState, MessageSink};

const FULLY_STARTED_TEXT: &str = "Server fully started!\n\n\
    All systems are operational.\n\
    Players can connect to the server.";

const STOPPED_RESPONDING_TEXT: &str = "Warning! Server stopped responding.\n\n\
    The server is unreachable.";

/// An operator-worthy transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// `starting`/`unhealthy` → `healthy`.
    FullyStarted,
    /// `healthy`/`degraded` → `unhealthy`.
    StoppedResponding,
}

impl Notification {
    pub fn text(&self) -> &'static str {
        match self {
            Notification::FullyStarted => FULLY_STARTED_TEXT,
            Notification::StoppedResponding => STOPPED_RESPONDING_TEXT,
        }
    }
}

/// Which notification, if any, a `previous → current` transition deserves.
pub fn notification_for(previous: HealthState, current: HealthState) -> Option<Notification> {
    use HealthState::*;
    match (previous, current) {
        (Starting | Unhealthy, Healthy) => Some(Notification::FullyStarted),
        (Healthy | Degraded, Unhealthy) => Some(Notification::StoppedResponding),
        _ => None,
    }
}

/// Per-recipient outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    /// (recipient, error)
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Notifier {
    sink: Arc<dyn MessageSink>,
    recipients: Vec<String>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessageSink>, recipients: Vec<String>) -> Self {
        Self { sink, recipients }
    }

    /// Recipients are the allowed groups followed by the admin users.
    pub fn from_config(sink: Arc<dyn MessageSink>, config: &NotificationsConfig) -> Self {
        Self::new(sink, config.recipients())
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Announce `snapshot` if it is a worthy transition.
    ///
    /// Returns `None` when nothing was sent.
    pub async fn on_transition(&self, snapshot: &HealthSnapshot) -> Option<DeliveryReport> {
        if !snapshot.status_changed {
            return None;
        }
        let Some(notification) =
            notification_for(snapshot.previous_status, snapshot.overall_status)
        else {
            debug!(
                from = %snapshot.previous_status,
                to = %snapshot.overall_status,
                "transition not announced"
            );
            return None;
        };

        let report = self.broadcast(notification.text()).await;
        info!(
            ?notification,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "transition announced"
        );
        Some(report)
    }

    /// Send `text` to every recipient, continuing past failures.
    pub async fn broadcast(&self, text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for recipient in &self.recipients {
            match self.sink.send(recipient, text).await {
                Ok(()) => report.delivered.push(recipient.clone()),
                Err(e) => {
                    error!(%recipient, error = %e, "failed to deliver notification");
                    report.failed.push((recipient.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
